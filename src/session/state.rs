// Session state — in-memory counters for one bot run.
//
// A session is RUNNING from construction until `finish()` sets the finish
// time, then FINISHED for good. Counters only grow, and every mutator is a
// no-op (with a warning) once the session is finished.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::limits::SessionLimits;

/// The driven account's own profile counts, captured at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    id: String,
    start_time: DateTime<Local>,
    #[serde(default)]
    finish_time: Option<DateTime<Local>>,
    #[serde(default)]
    total_interactions: BTreeMap<String, u32>,
    #[serde(default)]
    successful_interactions: BTreeMap<String, u32>,
    #[serde(default)]
    total_followed: BTreeMap<String, u32>,
    #[serde(default)]
    total_scraped: BTreeMap<String, u32>,
    #[serde(default)]
    total_likes: u32,
    #[serde(default)]
    total_unfollowed: u32,
    #[serde(default)]
    total_comments: u32,
    #[serde(default)]
    total_pm: u32,
    #[serde(default)]
    total_watched: u32,
    #[serde(default)]
    removed_mass_followers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<ProfileSnapshot>,
    /// Limits in force for this session, kept for reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limits: Option<SessionLimits>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    pub fn started_at(start_time: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time,
            finish_time: None,
            total_interactions: BTreeMap::new(),
            successful_interactions: BTreeMap::new(),
            total_followed: BTreeMap::new(),
            total_scraped: BTreeMap::new(),
            total_likes: 0,
            total_unfollowed: 0,
            total_comments: 0,
            total_pm: 0,
            total_watched: 0,
            removed_mass_followers: Vec::new(),
            profile: None,
            limits: None,
        }
    }

    // --- Lifecycle ---

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<DateTime<Local>> {
        self.finish_time
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }

    /// Mark the session finished. Calling it again keeps the first time.
    pub fn finish(&mut self) {
        self.finish_at(Local::now());
    }

    pub fn finish_at(&mut self, at: DateTime<Local>) {
        if self.finish_time.is_none() {
            self.finish_time = Some(at);
        }
    }

    /// Time between start and finish (or now, while running).
    pub fn duration(&self) -> Duration {
        let end = self.finish_time.unwrap_or_else(Local::now);
        end.signed_duration_since(self.start_time)
    }

    fn writable(&self, what: &str) -> bool {
        if self.is_finished() {
            warn!(session_id = %self.id, what, "Ignoring update to a finished session");
            return false;
        }
        true
    }

    // --- Mutators ---

    /// Count one interaction attempt against `source`.
    pub fn add_interaction(&mut self, source: &str, succeeded: bool, followed: bool, scraped: bool) {
        if !self.writable("interaction") {
            return;
        }
        *self.total_interactions.entry(source.to_string()).or_insert(0) += 1;
        if succeeded {
            *self
                .successful_interactions
                .entry(source.to_string())
                .or_insert(0) += 1;
        }
        if followed {
            *self.total_followed.entry(source.to_string()).or_insert(0) += 1;
        }
        if scraped {
            *self.total_scraped.entry(source.to_string()).or_insert(0) += 1;
        }
    }

    pub fn add_likes(&mut self, count: u32) {
        if self.writable("likes") {
            self.total_likes = self.total_likes.saturating_add(count);
        }
    }

    pub fn add_watched(&mut self, count: u32) {
        if self.writable("watched") {
            self.total_watched = self.total_watched.saturating_add(count);
        }
    }

    pub fn add_comment(&mut self) {
        if self.writable("comment") {
            self.total_comments += 1;
        }
    }

    pub fn add_pm(&mut self) {
        if self.writable("pm") {
            self.total_pm += 1;
        }
    }

    pub fn add_unfollowed(&mut self) {
        if self.writable("unfollowed") {
            self.total_unfollowed += 1;
        }
    }

    pub fn add_removed_mass_follower(&mut self, handle: &str) {
        if self.writable("removed follower") {
            self.removed_mass_followers.push(handle.to_string());
        }
    }

    pub fn set_profile(&mut self, profile: ProfileSnapshot) {
        if self.writable("profile") {
            self.profile = Some(profile);
        }
    }

    pub fn set_limits(&mut self, limits: SessionLimits) {
        if self.writable("limits") {
            self.limits = Some(limits);
        }
    }

    // --- Readers ---

    pub fn total_likes(&self) -> u32 {
        self.total_likes
    }

    pub fn total_unfollowed(&self) -> u32 {
        self.total_unfollowed
    }

    pub fn total_comments(&self) -> u32 {
        self.total_comments
    }

    pub fn total_pm(&self) -> u32 {
        self.total_pm
    }

    pub fn total_watched(&self) -> u32 {
        self.total_watched
    }

    pub fn total_interactions_for(&self, source: &str) -> u32 {
        self.total_interactions.get(source).copied().unwrap_or(0)
    }

    pub fn successful_interactions_for(&self, source: &str) -> u32 {
        self.successful_interactions.get(source).copied().unwrap_or(0)
    }

    pub fn followed_for(&self, source: &str) -> u32 {
        self.total_followed.get(source).copied().unwrap_or(0)
    }

    pub fn scraped_for(&self, source: &str) -> u32 {
        self.total_scraped.get(source).copied().unwrap_or(0)
    }

    pub fn sum_total_interactions(&self) -> u32 {
        self.total_interactions.values().sum()
    }

    pub fn sum_successful_interactions(&self) -> u32 {
        self.successful_interactions.values().sum()
    }

    pub fn sum_followed(&self) -> u32 {
        self.total_followed.values().sum()
    }

    pub fn sum_scraped(&self) -> u32 {
        self.total_scraped.values().sum()
    }

    /// Per-source (total, successful) interaction counts.
    pub fn sources(&self) -> Vec<(&str, u32, u32)> {
        self.total_interactions
            .iter()
            .map(|(source, total)| {
                (
                    source.as_str(),
                    *total,
                    self.successful_interactions_for(source),
                )
            })
            .collect()
    }

    pub fn removed_mass_followers(&self) -> &[String] {
        &self.removed_mass_followers
    }

    pub fn profile(&self) -> Option<&ProfileSnapshot> {
        self.profile.as_ref()
    }

    pub fn limits(&self) -> Option<&SessionLimits> {
        self.limits.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_running() {
        let session = SessionState::new();
        assert!(!session.is_finished());
        assert!(session.finish_time().is_none());
        assert_eq!(session.sum_total_interactions(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(SessionState::new().id(), SessionState::new().id());
    }

    #[test]
    fn test_add_interaction_splits_counters() {
        let mut session = SessionState::new();
        session.add_interaction("hashtag-likers:cats", true, true, false);
        session.add_interaction("hashtag-likers:cats", false, false, false);
        session.add_interaction("blogger-followers:alice", true, false, true);

        assert_eq!(session.total_interactions_for("hashtag-likers:cats"), 2);
        assert_eq!(session.successful_interactions_for("hashtag-likers:cats"), 1);
        assert_eq!(session.followed_for("hashtag-likers:cats"), 1);
        assert_eq!(session.scraped_for("blogger-followers:alice"), 1);
        assert_eq!(session.sum_total_interactions(), 3);
        assert_eq!(session.sum_successful_interactions(), 2);
    }

    #[test]
    fn test_finished_session_is_frozen() {
        let mut session = SessionState::new();
        session.add_likes(2);
        session.finish();
        let finished_at = session.finish_time();

        session.add_likes(5);
        session.add_interaction("x", true, true, true);
        session.finish();

        assert_eq!(session.total_likes(), 2);
        assert_eq!(session.sum_total_interactions(), 0);
        assert_eq!(session.finish_time(), finished_at);
    }

    #[test]
    fn test_json_uses_snake_case_keys() {
        let mut session = SessionState::new();
        session.add_pm();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["total_pm"], 1);
        assert!(json["finish_time"].is_null());
        assert!(json.get("removed_mass_followers").is_some());
    }
}
