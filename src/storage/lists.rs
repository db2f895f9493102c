// Manually maintained handle lists (blacklist.txt / whitelist.txt).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Normalize a handle for comparisons: trimmed, no leading `@`, lowercase.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

/// Load a list of handles, one per line. Blank lines and `#` comments are
/// ignored. A missing file is an empty list.
pub fn load_handle_list(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(content
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .map(normalize_handle)
        .filter(|h| !h.is_empty())
        .collect())
}
