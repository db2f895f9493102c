// Device capability — the UI automation surface the decision layer drives.
//
// Finding elements, clicking, and swiping all live behind this trait.
// The decision layer only sees account handles, profile numbers, and
// per-action success flags. The real implementation talks to a phone; the
// replay device in this module plays back a JSON script for dry runs.

pub mod replay;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::CandidateMetrics;

/// Failures reported by the device.
///
/// Transient errors fail the current step only. A block signal aborts the
/// current job, a language mismatch triggers a locale switch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device error: {0}")]
    Transient(String),
    #[error("action blocked by the app: {0}")]
    ActionBlocked(String),
    #[error("unexpected app language: {0}")]
    LanguageMismatch(String),
}

impl DeviceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Transient(_))
    }
}

/// Recovery routines the runner can ask the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Navigate back to a known screen (the own profile).
    SafeScreen,
    /// Switch the app to the expected locale.
    SwitchLanguage,
}

/// Profile data read from an account's page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub handle: String,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub posts: u64,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_business: bool,
    #[serde(default)]
    pub has_stories: bool,
}

impl ProfileInfo {
    pub fn metrics(&self) -> CandidateMetrics {
        CandidateMetrics {
            followers: self.followers,
            following: self.following,
            posts: self.posts,
            is_business: self.is_business,
            is_private: self.is_private,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowResult {
    Followed,
    /// Private account: a follow request was sent.
    Requested,
    Failed,
}

/// A list of accounts to work through, e.g. the likers of a hashtag's posts.
///
/// `job` names the kind of list, `target` what it is about. Per-source
/// session counters are keyed by [`label`](Self::label).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub job: String,
    pub target: String,
}

impl Source {
    pub const OWN_FOLLOWERS: &'static str = "own-followers";

    pub fn new(job: &str, target: &str) -> Self {
        Self {
            job: job.to_string(),
            target: target.trim_start_matches(['@', '#']).to_string(),
        }
    }

    pub fn own_followers(username: &str) -> Self {
        Self::new(Self::OWN_FOLLOWERS, username)
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.job, self.target)
    }

    /// Parse `job:target`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().split_once(':') {
            Some((job, target)) if !job.trim().is_empty() && !target.trim().is_empty() => {
                Ok(Self::new(job.trim(), target.trim()))
            }
            _ => anyhow::bail!("Invalid source '{}': expected job:target", s),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The operations the decision layer needs from a driven phone.
///
/// Every method leaves the device on a screen from which the next call
/// makes sense: profile actions are performed after `open_profile`, and
/// `back` returns to the list the profile was opened from.
#[async_trait]
pub trait Device: Send {
    /// Read the driven account's own profile numbers.
    async fn own_profile(&mut self) -> Result<ProfileInfo, DeviceError>;

    /// Handles currently visible in the list for `source`.
    async fn visible_accounts(&mut self, source: &Source) -> Result<Vec<String>, DeviceError>;

    /// Advance the list. `fling` skips further than a normal scroll.
    async fn scroll(&mut self, source: &Source, fling: bool) -> Result<(), DeviceError>;

    async fn open_profile(&mut self, handle: &str) -> Result<ProfileInfo, DeviceError>;

    /// Watch up to `count` stories, returning how many were watched.
    async fn watch_stories(&mut self, handle: &str, count: u32) -> Result<u32, DeviceError>;

    /// Like the post at `index` in the profile grid.
    async fn like_post(&mut self, handle: &str, index: u32) -> Result<bool, DeviceError>;

    async fn comment_post(&mut self, handle: &str, index: u32) -> Result<bool, DeviceError>;

    async fn send_pm(&mut self, handle: &str) -> Result<bool, DeviceError>;

    async fn follow(&mut self, handle: &str) -> Result<FollowResult, DeviceError>;

    async fn unfollow(&mut self, handle: &str) -> Result<bool, DeviceError>;

    /// Remove `handle` from the driven account's followers.
    async fn remove_follower(&mut self, handle: &str) -> Result<bool, DeviceError>;

    async fn back(&mut self) -> Result<(), DeviceError>;

    async fn recover(&mut self, recovery: Recovery) -> Result<(), DeviceError>;
}
