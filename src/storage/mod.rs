// Storage layer — durable per-account bookkeeping.
//
// Each driven account gets its own folder under the data directory:
//
//   <data_dir>/<username>/interacted_users.json   handle -> InteractionRecord
//   <data_dir>/<username>/filtered_users.json     handle -> FilteredRecord
//   <data_dir>/<username>/sessions.json           [SessionState, ...]
//   <data_dir>/<username>/blacklist.txt           never interact
//   <data_dir>/<username>/whitelist.txt           never unfollow
//
// Handles are stored normalized (see `lists::normalize_handle`), so
// `Alice`, `alice` and `@alice` are one account. The store is loaded once
// at startup and rewritten in full on every change. A file that fails to parse aborts startup: losing the history
// would make us interact with the same accounts again.

pub mod atomic;
pub mod history;
pub mod lists;
pub mod models;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use tracing::{debug, info};

use self::history::SessionHistory;
use self::lists::{load_handle_list, normalize_handle};
use self::models::{FilteredRecord, FollowingStatus, InteractionOutcome, InteractionRecord};

const INTERACTED_USERS_FILE: &str = "interacted_users.json";
const FILTERED_USERS_FILE: &str = "filtered_users.json";
const SESSIONS_FILE: &str = "sessions.json";
const BLACKLIST_FILE: &str = "blacklist.txt";
const WHITELIST_FILE: &str = "whitelist.txt";

pub struct Storage {
    username: String,
    account_dir: PathBuf,
    interacted: BTreeMap<String, InteractionRecord>,
    filtered: BTreeMap<String, FilteredRecord>,
    blacklist: HashSet<String>,
    whitelist: HashSet<String>,
}

impl Storage {
    /// Open (or create) the store for `username` under `data_dir`.
    pub fn open(data_dir: &Path, username: &str) -> Result<Self> {
        if username.trim().is_empty() {
            anyhow::bail!("Cannot open storage without an account username");
        }

        let account_dir = data_dir.join(username);
        std::fs::create_dir_all(&account_dir).with_context(|| {
            format!("Failed to create account folder {}", account_dir.display())
        })?;

        let interacted: BTreeMap<String, InteractionRecord> = normalize_keys(
            atomic::read_json(&account_dir.join(INTERACTED_USERS_FILE))?.unwrap_or_default(),
        );
        let filtered: BTreeMap<String, FilteredRecord> = normalize_keys(
            atomic::read_json(&account_dir.join(FILTERED_USERS_FILE))?.unwrap_or_default(),
        );
        let blacklist = load_handle_list(&account_dir.join(BLACKLIST_FILE))?;
        let whitelist = load_handle_list(&account_dir.join(WHITELIST_FILE))?;

        info!(
            account = username,
            interacted = interacted.len(),
            filtered = filtered.len(),
            blacklist = blacklist.len(),
            whitelist = whitelist.len(),
            "Storage loaded"
        );

        Ok(Self {
            username: username.to_string(),
            account_dir,
            interacted,
            filtered,
            blacklist,
            whitelist,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn account_dir(&self) -> &Path {
        &self.account_dir
    }

    pub fn history(&self) -> SessionHistory {
        SessionHistory::new(self.account_dir.join(SESSIONS_FILE))
    }

    // --- Interacted users ---

    /// Merge an interaction outcome into the account's record and persist.
    pub fn record(&mut self, handle: &str, outcome: &InteractionOutcome) -> Result<()> {
        self.record_at(handle, outcome, Local::now())
    }

    /// Same as [`record`](Self::record) with an explicit timestamp.
    pub fn record_at(
        &mut self,
        handle: &str,
        outcome: &InteractionOutcome,
        now: DateTime<Local>,
    ) -> Result<()> {
        let key = normalize_handle(handle);
        self.interacted.entry(key.clone()).or_default().merge(outcome, now);
        debug!(handle = %key, "Interaction recorded");
        self.save_interacted()
    }

    /// Whether we ever recorded an interaction with `handle`, and when last.
    pub fn was_interacted(&self, handle: &str) -> (bool, Option<DateTime<Local>>) {
        match self.interaction(handle) {
            Some(record) => (true, record.last_interaction),
            None => (false, None),
        }
    }

    pub fn interaction(&self, handle: &str) -> Option<&InteractionRecord> {
        self.interacted.get(&normalize_handle(handle))
    }

    pub fn following_status(&self, handle: &str) -> FollowingStatus {
        self.interaction(handle)
            .map(|r| r.following_status)
            .unwrap_or(FollowingStatus::NotInList)
    }

    pub fn interacted_count(&self) -> usize {
        self.interacted.len()
    }

    /// Number of accounts currently followed (or requested) by us.
    pub fn followed_by_script_count(&self) -> usize {
        self.interacted
            .values()
            .filter(|r| r.following_status.is_followed_by_script())
            .count()
    }

    /// Accounts we followed that are due for an unfollow, oldest first.
    ///
    /// Whitelisted accounts are never returned, and an account is only due
    /// once `min_age` has passed since its last interaction.
    pub fn unfollow_candidates(&self, min_age: Duration, now: DateTime<Local>) -> Vec<String> {
        let mut due: Vec<(&String, DateTime<Local>)> = self
            .interacted
            .iter()
            .filter(|(_, r)| r.following_status.is_followed_by_script())
            .filter(|(handle, _)| !self.is_in_whitelist(handle))
            .filter_map(|(handle, r)| r.last_interaction.map(|t| (handle, t)))
            .filter(|(_, t)| now.signed_duration_since(*t) >= min_age)
            .collect();
        due.sort_by_key(|(_, t)| *t);
        due.into_iter().map(|(h, _)| h.clone()).collect()
    }

    fn save_interacted(&self) -> Result<()> {
        atomic::write_json(&self.account_dir.join(INTERACTED_USERS_FILE), &self.interacted)
    }

    // --- Filtered users ---

    pub fn record_filtered(
        &mut self,
        handle: &str,
        reason: &str,
        job_name: &str,
        target: &str,
    ) -> Result<()> {
        self.filtered.insert(
            normalize_handle(handle),
            FilteredRecord {
                filtered_at: Local::now(),
                reason: reason.to_string(),
                job_name: Some(job_name.to_string()),
                target: Some(target.to_string()),
            },
        );
        atomic::write_json(&self.account_dir.join(FILTERED_USERS_FILE), &self.filtered)
    }

    pub fn was_filtered(&self, handle: &str) -> bool {
        self.filtered(handle).is_some()
    }

    pub fn filtered(&self, handle: &str) -> Option<&FilteredRecord> {
        self.filtered.get(&normalize_handle(handle))
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered.len()
    }

    // --- Manual lists ---

    pub fn is_in_blacklist(&self, handle: &str) -> bool {
        self.blacklist.contains(&normalize_handle(handle))
    }

    pub fn is_in_whitelist(&self, handle: &str) -> bool {
        self.whitelist.contains(&normalize_handle(handle))
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    pub fn whitelist_len(&self) -> usize {
        self.whitelist.len()
    }
}

// Files written before handles were normalized may carry `@` or capitals.
fn normalize_keys<V>(map: BTreeMap<String, V>) -> BTreeMap<String, V> {
    map.into_iter()
        .map(|(handle, value)| (normalize_handle(&handle), value))
        .collect()
}

/// Whether an account last seen at `last_interaction` may be interacted
/// with again.
///
/// A zero cooldown always allows it. An unset cooldown never does.
pub fn can_reinteract(last_interaction: DateTime<Local>, cooldown: Option<Duration>) -> bool {
    can_reinteract_at(last_interaction, cooldown, Local::now())
}

pub fn can_reinteract_at(
    last_interaction: DateTime<Local>,
    cooldown: Option<Duration>,
    now: DateTime<Local>,
) -> bool {
    match cooldown {
        None => false,
        Some(c) if c == Duration::zero() => true,
        Some(c) => now.signed_duration_since(last_interaction) >= c,
    }
}
