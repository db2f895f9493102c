// Session history — the per-account `sessions.json` array.
//
// Every finished (or interrupted) session is appended here. Sessions are
// keyed by id: persisting the same session twice replaces the earlier
// entry in place, so re-persisting after an interrupt never double-counts.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use super::atomic;
use crate::session::SessionState;

pub struct SessionHistory {
    path: PathBuf,
}

impl SessionHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all recorded sessions in insertion order.
    pub fn load(&self) -> Result<Vec<SessionState>> {
        let sessions: Vec<SessionState> = atomic::read_json(&self.path)?.unwrap_or_default();
        Ok(dedup_by_id(sessions))
    }

    /// Write `session` into the history, replacing any entry with the same id.
    pub fn persist(&self, session: &SessionState) -> Result<()> {
        let mut sessions = self.load()?;
        upsert(&mut sessions, session);
        atomic::write_json(&self.path, &sessions)?;
        debug!(
            session_id = session.id(),
            total = sessions.len(),
            "Session history written"
        );
        Ok(())
    }
}

fn upsert(sessions: &mut Vec<SessionState>, session: &SessionState) {
    match sessions.iter_mut().find(|s| s.id() == session.id()) {
        Some(existing) => *existing = session.clone(),
        None => sessions.push(session.clone()),
    }
}

/// Collapse duplicate ids, keeping the position of the first occurrence and
/// the contents of the last.
fn dedup_by_id(sessions: Vec<SessionState>) -> Vec<SessionState> {
    let mut out: Vec<SessionState> = Vec::with_capacity(sessions.len());
    for session in sessions {
        upsert(&mut out, &session);
    }
    out
}
