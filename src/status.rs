// Account status display — store sizes, lists, and the last session.

use anyhow::Result;

use crate::output::{format_duration, terminal};
use crate::storage::Storage;

/// Display account status to the terminal.
pub fn show(storage: &Storage) -> Result<()> {
    println!("Account: {}", storage.username());
    println!("Data folder: {}", storage.account_dir().display());

    let folder_size = dir_size(storage.account_dir());
    println!("Stored data: {}", format_bytes(folder_size));

    println!(
        "Interacted accounts: {} ({} currently followed by us)",
        storage.interacted_count(),
        storage.followed_by_script_count()
    );
    println!("Filtered accounts: {}", storage.filtered_count());
    println!(
        "Blacklist: {} accounts, whitelist: {} accounts",
        storage.blacklist_len(),
        storage.whitelist_len()
    );

    let sessions = storage.history().load()?;
    match sessions.last() {
        Some(last) => {
            let total: i64 = sessions.iter().map(|s| s.duration().num_seconds()).sum();
            println!(
                "Sessions: {} (total run time {})",
                sessions.len(),
                format_duration(chrono::Duration::seconds(total))
            );
            terminal::display_session_summary(last);
        }
        None => {
            println!("Sessions: none yet");
            println!("  Run `gramkeeper run` to start one");
        }
    }

    Ok(())
}

fn dir_size(path: &std::path::Path) -> u64 {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
