// Data models for the per-account JSON files.
//
// These types are the on-disk schema. The in-memory store is a map from
// account handle to InteractionRecord, serialized as a single JSON object.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Relationship this tool has established with a target account.
///
/// Stored lower-cased (`"followed"`, `"not_in_list"`, ...). The names are
/// part of the file format, so renaming a variant needs a serde alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowingStatus {
    #[default]
    None,
    Followed,
    Requested,
    Unfollowed,
    NotInList,
    Scraped,
}

impl FollowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowingStatus::None => "none",
            FollowingStatus::Followed => "followed",
            FollowingStatus::Requested => "requested",
            FollowingStatus::Unfollowed => "unfollowed",
            FollowingStatus::NotInList => "not_in_list",
            FollowingStatus::Scraped => "scraped",
        }
    }

    /// Whether this status came from a follow action of ours (and is
    /// therefore a candidate for a later unfollow).
    pub fn is_followed_by_script(&self) -> bool {
        matches!(self, FollowingStatus::Followed | FollowingStatus::Requested)
    }
}

impl std::fmt::Display for FollowingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything we remember about one target account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(default)]
    pub last_interaction: Option<DateTime<Local>>,
    #[serde(default)]
    pub following_status: FollowingStatus,
    #[serde(default)]
    pub liked: u32,
    #[serde(default)]
    pub watched: u32,
    #[serde(default)]
    pub commented: u32,
    #[serde(default)]
    pub followed: bool,
    #[serde(default)]
    pub unfollowed: bool,
    #[serde(default)]
    pub scraped: bool,
    #[serde(default)]
    pub pm_sent: bool,
    /// Session that wrote this record last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Job and target that first touched this account. Never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// The result of one interaction attempt, as reported by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionOutcome {
    pub session_id: String,
    pub job_name: String,
    pub target: String,
    pub liked: u32,
    pub watched: u32,
    pub commented: u32,
    pub followed: bool,
    pub requested: bool,
    pub unfollowed: bool,
    pub scraped: bool,
    pub pm_sent: bool,
}

impl InteractionOutcome {
    /// The relationship this outcome establishes, if any.
    ///
    /// Flags are checked in priority order; an outcome with no relationship
    /// flag leaves the stored status untouched.
    pub fn following_status(&self) -> Option<FollowingStatus> {
        if self.followed {
            Some(FollowingStatus::Followed)
        } else if self.requested {
            Some(FollowingStatus::Requested)
        } else if self.unfollowed {
            Some(FollowingStatus::Unfollowed)
        } else if self.scraped {
            Some(FollowingStatus::Scraped)
        } else {
            None
        }
    }
}

impl InteractionRecord {
    /// Merge a new outcome into this record.
    ///
    /// - `liked`, `watched`, `commented` accumulate.
    /// - `following_status` is replaced when the outcome carries one.
    /// - boolean flags only flip on a `true` observation.
    /// - `session_id` is always the latest; `job_name`/`target` stick to
    ///   the first writer.
    pub fn merge(&mut self, outcome: &InteractionOutcome, now: DateTime<Local>) {
        self.last_interaction = Some(now);

        if let Some(status) = outcome.following_status() {
            self.following_status = status;
        }

        self.session_id = Some(outcome.session_id.clone());
        if self.job_name.is_none() && !outcome.job_name.is_empty() {
            self.job_name = Some(outcome.job_name.clone());
        }
        if self.target.is_none() && !outcome.target.is_empty() {
            self.target = Some(outcome.target.clone());
        }

        self.liked = self.liked.saturating_add(outcome.liked);
        self.watched = self.watched.saturating_add(outcome.watched);
        self.commented = self.commented.saturating_add(outcome.commented);

        self.followed |= outcome.followed || outcome.requested;
        self.unfollowed |= outcome.unfollowed;
        self.scraped |= outcome.scraped;
        self.pm_sent |= outcome.pm_sent;
    }
}

/// An account the Filter rejected, kept so later runs skip it cheaply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredRecord {
    pub filtered_at: DateTime<Local>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}
