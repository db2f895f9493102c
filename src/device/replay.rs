// Replay device — plays back a JSON script instead of driving a phone.
//
// Script format:
//
//   {
//     "own_profile": { "handle": "me", "followers": 120, "following": 80, "posts": 12 },
//     "pages": { "hashtag-likers:cats": [["a", "b"], ["c", "d"]] },
//     "profiles": { "a": { "handle": "a", "followers": 300, "following": 150, "posts": 40 } }
//   }
//
// Each source's pages are returned in order; scrolling past the last page
// keeps returning it, which is what a list at its end looks like. Every
// action succeeds, except on profiles that aren't in the script.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Device, DeviceError, FollowResult, ProfileInfo, Recovery, Source};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub own_profile: ProfileInfo,
    #[serde(default)]
    pub pages: HashMap<String, Vec<Vec<String>>>,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileInfo>,
}

pub struct ReplayDevice {
    script: ReplayScript,
    cursors: HashMap<String, usize>,
}

impl ReplayDevice {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            cursors: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script {}", path.display()))?;
        let script: ReplayScript = serde_json::from_str(&content)
            .with_context(|| format!("Malformed replay script {}", path.display()))?;
        Ok(Self::new(script))
    }

    fn profile(&self, handle: &str) -> Result<&ProfileInfo, DeviceError> {
        self.script
            .profiles
            .get(handle)
            .ok_or_else(|| DeviceError::Transient(format!("profile @{handle} not found")))
    }
}

#[async_trait]
impl Device for ReplayDevice {
    async fn own_profile(&mut self) -> Result<ProfileInfo, DeviceError> {
        Ok(self.script.own_profile.clone())
    }

    async fn visible_accounts(&mut self, source: &Source) -> Result<Vec<String>, DeviceError> {
        let label = source.label();
        let pages = match self.script.pages.get(&label) {
            Some(pages) if !pages.is_empty() => pages,
            _ => return Ok(Vec::new()),
        };
        let cursor = self.cursors.get(&label).copied().unwrap_or(0);
        Ok(pages[cursor.min(pages.len() - 1)].clone())
    }

    async fn scroll(&mut self, source: &Source, fling: bool) -> Result<(), DeviceError> {
        let step = if fling { 2 } else { 1 };
        *self.cursors.entry(source.label()).or_insert(0) += step;
        debug!(source = %source, fling, "Replay scroll");
        Ok(())
    }

    async fn open_profile(&mut self, handle: &str) -> Result<ProfileInfo, DeviceError> {
        self.profile(handle).cloned()
    }

    async fn watch_stories(&mut self, handle: &str, count: u32) -> Result<u32, DeviceError> {
        Ok(if self.profile(handle)?.has_stories { count } else { 0 })
    }

    async fn like_post(&mut self, handle: &str, index: u32) -> Result<bool, DeviceError> {
        let profile = self.profile(handle)?;
        Ok(u64::from(index) < profile.posts)
    }

    async fn comment_post(&mut self, handle: &str, index: u32) -> Result<bool, DeviceError> {
        self.like_post(handle, index).await
    }

    async fn send_pm(&mut self, handle: &str) -> Result<bool, DeviceError> {
        self.profile(handle)?;
        Ok(true)
    }

    async fn follow(&mut self, handle: &str) -> Result<FollowResult, DeviceError> {
        Ok(if self.profile(handle)?.is_private {
            FollowResult::Requested
        } else {
            FollowResult::Followed
        })
    }

    async fn unfollow(&mut self, _handle: &str) -> Result<bool, DeviceError> {
        Ok(true)
    }

    async fn remove_follower(&mut self, _handle: &str) -> Result<bool, DeviceError> {
        Ok(true)
    }

    async fn back(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn recover(&mut self, recovery: Recovery) -> Result<(), DeviceError> {
        debug!(?recovery, "Replay recovery");
        Ok(())
    }
}
