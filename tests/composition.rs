// Composition tests — the decision layer driving a scripted device.
//
// These tests exercise the data flow between modules:
//   Device -> Orchestrator -> Limits / Session -> Storage
//   Job loop -> End detector -> Runner recovery
// with the device replaced by an in-memory script that records every call
// and can be told to fail specific ones. Storage lives in a temp folder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveTime};
use tempfile::TempDir;

use gramkeeper::device::{Device, DeviceError, FollowResult, ProfileInfo, Recovery, Source};
use gramkeeper::filter::{Filter, FilterConfig, SkipReason};
use gramkeeper::interaction::job::{run_source_job, JobOutcome};
use gramkeeper::interaction::mass_followers::run_remove_mass_followers;
use gramkeeper::interaction::orchestrator::{interact_with_user, CandidateOutcome, SkipCause};
use gramkeeper::interaction::pacing::Pacing;
use gramkeeper::interaction::runner::{run, run_session, RunPlan, Schedule};
use gramkeeper::interaction::shutdown;
use gramkeeper::interaction::unfollow::run_unfollow_job;
use gramkeeper::interaction::{BotContext, Clock, InteractionSettings, JobError, StopReason};
use gramkeeper::session::{LimitValue, SessionLimits, WorkingHours};
use gramkeeper::storage::models::{FollowingStatus, InteractionOutcome};
use gramkeeper::storage::Storage;

// ============================================================
// Scripted device
// ============================================================

#[derive(Default)]
struct ScriptedDevice {
    own: ProfileInfo,
    pages: HashMap<String, Vec<Vec<String>>>,
    cursors: HashMap<String, usize>,
    profiles: HashMap<String, ProfileInfo>,
    /// Call string (e.g. "like:a:1") -> error returned on that call, once.
    fail_on: HashMap<String, DeviceError>,
    /// Fail this many `visible_accounts` calls with a language mismatch.
    language_failures: u32,
    own_profile_fails: bool,
    /// `follow` never completes.
    hang_on_follow: bool,
    /// Call string -> side effect run every time that call is made.
    on_call: HashMap<String, Box<dyn FnMut() + Send>>,
    calls: Vec<String>,
    recoveries: Vec<Recovery>,
}

impl ScriptedDevice {
    fn with_profiles(profiles: Vec<ProfileInfo>) -> Self {
        Self {
            own: profile("me", 500, 300, 20),
            profiles: profiles.into_iter().map(|p| (p.handle.clone(), p)).collect(),
            ..Default::default()
        }
    }

    fn page(mut self, source: &Source, pages: &[&[&str]]) -> Self {
        self.pages.insert(
            source.label(),
            pages
                .iter()
                .map(|p| p.iter().map(|h| h.to_string()).collect())
                .collect(),
        );
        self
    }

    fn on(mut self, call: &str, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_call.insert(call.to_string(), Box::new(hook));
        self
    }

    fn call(&mut self, call: String) -> Result<(), DeviceError> {
        if let Some(hook) = self.on_call.get_mut(&call) {
            hook();
        }
        let failure = self.fail_on.remove(&call);
        self.calls.push(call);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn profile(handle: &str, followers: u64, following: u64, posts: u64) -> ProfileInfo {
    ProfileInfo {
        handle: handle.to_string(),
        followers,
        following,
        posts,
        ..Default::default()
    }
}

#[async_trait]
impl Device for ScriptedDevice {
    async fn own_profile(&mut self) -> Result<ProfileInfo, DeviceError> {
        if self.own_profile_fails {
            return Err(DeviceError::Transient("profile tab not found".into()));
        }
        self.call("own".into())?;
        Ok(self.own.clone())
    }

    async fn visible_accounts(&mut self, source: &Source) -> Result<Vec<String>, DeviceError> {
        if self.language_failures > 0 {
            self.language_failures -= 1;
            return Err(DeviceError::LanguageMismatch("de".into()));
        }
        self.call(format!("list:{}", source.label()))?;
        let label = source.label();
        let cursor = self.cursors.get(&label).copied().unwrap_or(0);
        Ok(match self.pages.get(&label) {
            Some(pages) if !pages.is_empty() => pages[cursor.min(pages.len() - 1)].clone(),
            _ => Vec::new(),
        })
    }

    async fn scroll(&mut self, source: &Source, fling: bool) -> Result<(), DeviceError> {
        self.call(format!("scroll:{}:{fling}", source.label()))?;
        *self.cursors.entry(source.label()).or_insert(0) += if fling { 2 } else { 1 };
        Ok(())
    }

    async fn open_profile(&mut self, handle: &str) -> Result<ProfileInfo, DeviceError> {
        self.call(format!("open:{handle}"))?;
        self.profiles
            .get(handle)
            .cloned()
            .ok_or_else(|| DeviceError::Transient(format!("no profile {handle}")))
    }

    async fn watch_stories(&mut self, handle: &str, count: u32) -> Result<u32, DeviceError> {
        self.call(format!("stories:{handle}"))?;
        Ok(count)
    }

    async fn like_post(&mut self, handle: &str, index: u32) -> Result<bool, DeviceError> {
        self.call(format!("like:{handle}:{index}"))?;
        Ok(true)
    }

    async fn comment_post(&mut self, handle: &str, index: u32) -> Result<bool, DeviceError> {
        self.call(format!("comment:{handle}:{index}"))?;
        Ok(true)
    }

    async fn send_pm(&mut self, handle: &str) -> Result<bool, DeviceError> {
        self.call(format!("pm:{handle}"))?;
        Ok(true)
    }

    async fn follow(&mut self, handle: &str) -> Result<FollowResult, DeviceError> {
        self.call(format!("follow:{handle}"))?;
        if self.hang_on_follow {
            std::future::pending::<()>().await;
        }
        let private = self.profiles.get(handle).is_some_and(|p| p.is_private);
        Ok(if private {
            FollowResult::Requested
        } else {
            FollowResult::Followed
        })
    }

    async fn unfollow(&mut self, handle: &str) -> Result<bool, DeviceError> {
        self.call(format!("unfollow:{handle}"))?;
        Ok(true)
    }

    async fn remove_follower(&mut self, handle: &str) -> Result<bool, DeviceError> {
        self.call(format!("remove:{handle}"))?;
        Ok(true)
    }

    async fn back(&mut self) -> Result<(), DeviceError> {
        self.call("back".into())
    }

    async fn recover(&mut self, recovery: Recovery) -> Result<(), DeviceError> {
        self.recoveries.push(recovery);
        Ok(())
    }
}

// ============================================================
// Context helpers
// ============================================================

fn settings(likes: u32) -> InteractionSettings {
    InteractionSettings {
        likes_count: LimitValue::Fixed(likes),
        ..Default::default()
    }
}

fn context(limits: SessionLimits, filter: FilterConfig, settings: InteractionSettings) -> (TempDir, BotContext) {
    context_with_lists(limits, filter, settings, "", "")
}

fn context_with_lists(
    limits: SessionLimits,
    filter: FilterConfig,
    settings: InteractionSettings,
    blacklist: &str,
    whitelist: &str,
) -> (TempDir, BotContext) {
    let dir = TempDir::new().unwrap();
    let account = dir.path().join("me");
    std::fs::create_dir_all(&account).unwrap();
    std::fs::write(account.join("blacklist.txt"), blacklist).unwrap();
    std::fs::write(account.join("whitelist.txt"), whitelist).unwrap();
    let storage = Storage::open(dir.path(), "me").unwrap();
    let ctx = BotContext::new(storage, limits, Filter::new(filter), settings, Pacing::disabled());
    (dir, ctx)
}

fn source() -> Source {
    Source::new("hashtag-likers", "cats")
}

/// Trigger shutdown on the first `call`.
fn shutdown_on(ctx: BotContext, device: ScriptedDevice, call: &str) -> (BotContext, ScriptedDevice) {
    let (trigger, stop) = shutdown::channel();
    (ctx.with_shutdown(stop), device.on(call, move || trigger.trigger()))
}

/// A clock showing `minutes` past midnight, movable from device hooks.
fn movable_clock(minutes: u32) -> (Arc<AtomicU32>, Clock) {
    let now = Arc::new(AtomicU32::new(minutes));
    let read = Arc::clone(&now);
    let clock: Clock = Arc::new(move || {
        NaiveTime::from_num_seconds_from_midnight_opt(read.load(Ordering::SeqCst) * 60, 0).unwrap()
    });
    (now, clock)
}

// ============================================================
// Orchestrator
// ============================================================

#[tokio::test]
async fn filtered_candidate_leaves_no_interaction_trace() {
    let (_dir, mut ctx) = context(
        SessionLimits::default(),
        FilterConfig {
            min_followers: Some(100),
            ..Default::default()
        },
        settings(2),
    );
    let mut device = ScriptedDevice::with_profiles(vec![profile("small", 50, 80, 10)]);

    let outcome = interact_with_user(&mut ctx, &mut device, &source(), "small")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CandidateOutcome::Skipped(SkipCause::Filtered(SkipReason::TooFewFollowers))
    );
    assert_eq!(ctx.storage.was_interacted("small"), (false, None));
    assert!(ctx.storage.was_filtered("small"));
    assert_eq!(ctx.session.sum_total_interactions(), 0);
    assert_eq!(device.count("like:"), 0);

    // A second visit skips without opening the profile again.
    let again = interact_with_user(&mut ctx, &mut device, &source(), "small")
        .await
        .unwrap();
    assert_eq!(again, CandidateOutcome::Skipped(SkipCause::PreviouslyFiltered));
    assert_eq!(device.count("open:"), 1);
}

#[tokio::test]
async fn likes_limit_stops_mid_profile_and_blocks_next() {
    let (_dir, mut ctx) = context(
        SessionLimits {
            likes: Some(2),
            ..Default::default()
        },
        FilterConfig::default(),
        settings(3),
    );
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
    ]);

    interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();
    assert_eq!(device.count("like:a:"), 2);
    assert_eq!(ctx.session.total_likes(), 2);

    interact_with_user(&mut ctx, &mut device, &source(), "b").await.unwrap();
    assert_eq!(device.count("like:b:"), 0);
    assert_eq!(ctx.session.total_likes(), 2);
    assert_eq!(ctx.storage.interaction("a").unwrap().liked, 2);
}

#[tokio::test]
async fn blacklisted_and_own_accounts_are_never_opened() {
    let (_dir, mut ctx) = context_with_lists(
        SessionLimits::default(),
        FilterConfig::default(),
        settings(1),
        "@Spammer\n",
        "",
    );
    let mut device = ScriptedDevice::with_profiles(vec![profile("spammer", 300, 200, 10)]);

    let outcome = interact_with_user(&mut ctx, &mut device, &source(), "spammer")
        .await
        .unwrap();
    assert_eq!(outcome, CandidateOutcome::Skipped(SkipCause::Blacklisted));

    let own = interact_with_user(&mut ctx, &mut device, &source(), "me").await.unwrap();
    assert_eq!(own, CandidateOutcome::Skipped(SkipCause::OwnAccount));
    assert!(device.calls.is_empty());
}

#[tokio::test]
async fn private_account_only_gets_pm_and_follow() {
    let (_dir, mut ctx) = context(
        SessionLimits::default(),
        FilterConfig::default(),
        InteractionSettings {
            stories_percentage: 100,
            comment_percentage: 100,
            pm_percentage: 100,
            follow_percentage: 100,
            ..settings(2)
        },
    );
    let private = ProfileInfo {
        is_private: true,
        has_stories: true,
        ..profile("locked", 300, 200, 10)
    };
    let mut device = ScriptedDevice::with_profiles(vec![private]);

    let outcome = interact_with_user(&mut ctx, &mut device, &source(), "locked")
        .await
        .unwrap();

    let CandidateOutcome::Interacted(summary) = outcome else {
        panic!("expected an interaction");
    };
    assert!(summary.pm_sent);
    assert!(summary.requested());
    assert_eq!(device.count("stories:"), 0);
    assert_eq!(device.count("like:"), 0);
    assert_eq!(device.count("comment:"), 0);
    assert_eq!(ctx.storage.following_status("locked"), FollowingStatus::Requested);
    assert_eq!(ctx.session.followed_for(&source().label()), 1);
    assert_eq!(ctx.session.total_pm(), 1);
}

#[tokio::test]
async fn public_account_gets_every_action() {
    let (_dir, mut ctx) = context(
        SessionLimits::default(),
        FilterConfig::default(),
        InteractionSettings {
            stories_percentage: 100,
            comment_percentage: 100,
            follow_percentage: 100,
            stories_count: LimitValue::Fixed(2),
            ..settings(2)
        },
    );
    let open = ProfileInfo {
        has_stories: true,
        ..profile("open", 300, 200, 10)
    };
    let mut device = ScriptedDevice::with_profiles(vec![open]);

    interact_with_user(&mut ctx, &mut device, &source(), "open").await.unwrap();

    let record = ctx.storage.interaction("open").unwrap();
    assert_eq!(record.watched, 2);
    assert_eq!(record.liked, 2);
    assert_eq!(record.commented, 1);
    assert_eq!(record.following_status, FollowingStatus::Followed);
    assert_eq!(ctx.session.successful_interactions_for(&source().label()), 1);
    assert_eq!(ctx.session.total_watched(), 2);
    assert_eq!(ctx.session.total_comments(), 1);
}

#[tokio::test]
async fn reinteraction_needs_a_cooldown() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)]);

    interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();
    let second = interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();
    assert_eq!(second, CandidateOutcome::Skipped(SkipCause::AlreadyInteracted));

    ctx.settings.reinteract_after = Some(Duration::zero());
    let third = interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();
    assert!(matches!(third, CandidateOutcome::Interacted(_)));
    assert_eq!(ctx.storage.interaction("a").unwrap().liked, 2);
}

#[tokio::test]
async fn transient_failure_only_fails_its_step() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(3));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)]);
    device
        .fail_on
        .insert("like:a:1".into(), DeviceError::Transient("button not found".into()));

    interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();

    assert_eq!(device.count("like:a:"), 3);
    assert_eq!(ctx.session.total_likes(), 2);
    assert_eq!(ctx.storage.interaction("a").unwrap().liked, 2);
}

#[tokio::test]
async fn block_keeps_partial_progress_and_propagates() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(3));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)]);
    device
        .fail_on
        .insert("like:a:1".into(), DeviceError::ActionBlocked("try again later".into()));

    let err = interact_with_user(&mut ctx, &mut device, &source(), "a")
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Device(DeviceError::ActionBlocked(_))));
    assert_eq!(device.count("like:a:"), 2);
    assert_eq!(ctx.session.total_likes(), 1);
    assert_eq!(ctx.storage.interaction("a").unwrap().liked, 1);
    assert_eq!(ctx.session.total_interactions_for(&source().label()), 1);
}

#[tokio::test]
async fn scrape_mode_records_without_interacting() {
    let (_dir, mut ctx) = context(
        SessionLimits::default(),
        FilterConfig::default(),
        InteractionSettings {
            scrape_only: true,
            follow_percentage: 100,
            ..settings(3)
        },
    );
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)]);

    let outcome = interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();

    assert_eq!(outcome, CandidateOutcome::Scraped);
    assert_eq!(device.count("like:"), 0);
    assert_eq!(device.count("follow:"), 0);
    assert_eq!(ctx.storage.following_status("a"), FollowingStatus::Scraped);
    assert_eq!(ctx.session.scraped_for(&source().label()), 1);
}

#[tokio::test]
async fn dropped_interaction_leaves_session_and_store_in_agreement() {
    let (_dir, mut ctx) = context(
        SessionLimits::default(),
        FilterConfig::default(),
        InteractionSettings {
            follow_percentage: 100,
            ..settings(2)
        },
    );
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)]);
    device.hang_on_follow = true;

    let cancelled = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        interact_with_user(&mut ctx, &mut device, &source(), "a"),
    )
    .await;

    assert!(cancelled.is_err());
    assert_eq!(device.count("like:a:"), 2);
    assert_eq!(ctx.session.total_likes(), 0);
    assert_eq!(ctx.session.sum_total_interactions(), 0);
    assert_eq!(ctx.storage.was_interacted("a"), (false, None));
}

#[tokio::test]
async fn failed_back_navigation_is_not_repeated() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)]);
    device
        .fail_on
        .insert("back".into(), DeviceError::Transient("back button missing".into()));

    let outcome = interact_with_user(&mut ctx, &mut device, &source(), "a").await.unwrap();

    assert!(matches!(outcome, CandidateOutcome::Interacted(_)));
    assert_eq!(device.count("back"), 1);
    assert_eq!(ctx.storage.interaction("a").unwrap().liked, 1);
}

// ============================================================
// Jobs
// ============================================================

#[tokio::test]
async fn source_job_stops_when_list_stops_moving() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"]]);

    let outcome = run_source_job(&mut ctx, &mut device, &source()).await.unwrap();

    assert_eq!(outcome, JobOutcome::EndOfList);
    assert_eq!(device.count("open:"), 2);
    assert_eq!(device.count("list:"), 2);
    assert_eq!(ctx.session.total_interactions_for(&source().label()), 2);
}

#[tokio::test]
async fn unopenable_profile_is_skipped_without_navigating_back() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)])
        .page(&source(), &[&["ghost", "a"]]);

    let outcome = run_source_job(&mut ctx, &mut device, &source()).await.unwrap();

    assert_eq!(outcome, JobOutcome::EndOfList);
    for pair in device.calls.windows(2) {
        assert!(
            !(pair[0] == "open:ghost" && pair[1] == "back"),
            "went back from a profile that never opened: {:?}",
            device.calls
        );
    }
    assert_eq!(device.count("back"), 1);
    assert!(ctx.storage.was_interacted("a").0);
    assert!(!ctx.storage.was_interacted("ghost").0);
}

#[tokio::test]
async fn source_job_respects_per_source_budget() {
    let (_dir, mut ctx) = context(
        SessionLimits {
            per_source: Some(1),
            ..Default::default()
        },
        FilterConfig::default(),
        settings(1),
    );
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"]]);

    let outcome = run_source_job(&mut ctx, &mut device, &source()).await.unwrap();

    assert_eq!(outcome, JobOutcome::SourceExhausted);
    assert_eq!(device.count("open:b"), 0);
}

#[tokio::test]
async fn source_job_stops_at_session_limit() {
    let (_dir, mut ctx) = context(
        SessionLimits {
            likes: Some(1),
            ..Default::default()
        },
        FilterConfig::default(),
        settings(1),
    );
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"], &["c", "d"]]);

    let outcome = run_source_job(&mut ctx, &mut device, &source()).await.unwrap();

    assert_eq!(outcome, JobOutcome::LimitReached);
    assert_eq!(device.count("open:"), 1);
}

#[tokio::test]
async fn skipped_pages_escalate_to_fling_then_stop() {
    let (_dir, mut ctx) = context_with_lists(
        SessionLimits::default(),
        FilterConfig::default(),
        InteractionSettings {
            skipped_fling_limit: 2,
            skipped_list_limit: 3,
            ..settings(1)
        },
        "x1\nx2\nx3\nx4\nx5\nx6\n",
        "",
    );
    let mut device = ScriptedDevice::with_profiles(Vec::new()).page(
        &source(),
        &[&["x1"], &["x2"], &["x3"], &["x4"], &["x5"], &["x6"]],
    );

    let outcome = run_source_job(&mut ctx, &mut device, &source()).await.unwrap();

    assert_eq!(outcome, JobOutcome::SkipLimitReached);
    assert_eq!(device.count("scroll:hashtag-likers:cats:true"), 1);
    assert_eq!(device.count("open:"), 0);
}

#[tokio::test]
async fn unfollow_job_walks_due_accounts_until_limit() {
    let (_dir, mut ctx) = context_with_lists(
        SessionLimits {
            unfollows: Some(2),
            ..Default::default()
        },
        FilterConfig::default(),
        settings(1),
        "",
        "friend\n",
    );
    let followed = InteractionOutcome {
        session_id: "old".into(),
        followed: true,
        ..Default::default()
    };
    let now = Local::now();
    for (handle, days) in [("a", 10), ("b", 9), ("c", 8), ("friend", 20), ("fresh", 1)] {
        ctx.storage
            .record_at(handle, &followed, now - Duration::days(days))
            .unwrap();
    }
    let mut device = ScriptedDevice::with_profiles(Vec::new());

    let report = run_unfollow_job(&mut ctx, &mut device).await.unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.unfollowed, 2);
    assert!(report.limit_reached);
    assert_eq!(device.calls, vec!["unfollow:a".to_string(), "unfollow:b".to_string()]);
    assert_eq!(ctx.storage.following_status("a"), FollowingStatus::Unfollowed);
    assert_eq!(ctx.storage.following_status("c"), FollowingStatus::Followed);
    assert_eq!(ctx.session.total_unfollowed(), 2);
}

#[tokio::test]
async fn mass_followers_are_removed() {
    let mut settings = settings(1);
    settings.max_following_for_removal = 1_000;
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings);
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("spam", 10, 7_500, 0),
        profile("fan", 200, 150, 30),
    ])
    .page(&Source::own_followers("me"), &[&["spam", "fan"]]);

    let removed = run_remove_mass_followers(&mut ctx, &mut device).await.unwrap();

    assert_eq!(removed, 1);
    assert_eq!(device.count("remove:"), 1);
    assert_eq!(ctx.session.removed_mass_followers(), ["spam".to_string()]);
}

// ============================================================
// Runner recovery
// ============================================================

#[tokio::test]
async fn block_abandons_job_and_session_moves_on() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let second = Source::new("blogger-followers", "bob");
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("c", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"]])
    .page(&second, &[&["c"]]);
    device
        .fail_on
        .insert("like:a:0".into(), DeviceError::ActionBlocked("limited".into()));

    let plan = RunPlan {
        sources: vec![source(), second],
        ..Default::default()
    };
    run_session(&mut ctx, &mut device, &plan).await.unwrap();

    assert_eq!(device.recoveries, vec![Recovery::SafeScreen]);
    assert_eq!(device.count("open:b"), 0);
    assert_eq!(device.count("like:c:0"), 1);
    assert_eq!(ctx.session.profile().map(|p| p.followers), Some(500));
}

#[tokio::test]
async fn language_mismatch_switches_locale_and_retries_once() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)])
        .page(&source(), &[&["a"]]);
    device.language_failures = 1;

    let plan = RunPlan {
        sources: vec![source()],
        ..Default::default()
    };
    run_session(&mut ctx, &mut device, &plan).await.unwrap();

    assert_eq!(device.recoveries, vec![Recovery::SwitchLanguage]);
    assert_eq!(device.count("like:a:0"), 1);
}

#[tokio::test]
async fn persistent_language_mismatch_gives_up() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)])
        .page(&source(), &[&["a"]]);
    device.language_failures = 5;

    let plan = RunPlan {
        sources: vec![source()],
        ..Default::default()
    };
    run_session(&mut ctx, &mut device, &plan).await.unwrap();

    assert_eq!(
        device.recoveries,
        vec![Recovery::SwitchLanguage, Recovery::SafeScreen]
    );
    assert_eq!(device.count("open:"), 0);
}

#[tokio::test]
async fn unreadable_own_profile_fails_the_session() {
    let (_dir, mut ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let mut device = ScriptedDevice::with_profiles(Vec::new());
    device.own_profile_fails = true;

    let plan = RunPlan {
        sources: vec![source()],
        ..Default::default()
    };
    assert!(run_session(&mut ctx, &mut device, &plan).await.is_err());
    assert!(device.calls.is_empty());
}

// ============================================================
// Shutdown and working hours
// ============================================================

#[tokio::test]
async fn shutdown_finishes_current_account_then_stops() {
    let (_dir, ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(2));
    let device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"]]);
    let (mut ctx, mut device) = shutdown_on(ctx, device, "like:a:0");

    let outcome = run_source_job(&mut ctx, &mut device, &source()).await.unwrap();

    assert_eq!(outcome, JobOutcome::Stopped(StopReason::Interrupted));
    assert_eq!(device.count("like:a:"), 2);
    assert_eq!(device.count("open:b"), 0);
    assert_eq!(ctx.session.total_likes(), 2);
    assert_eq!(ctx.storage.interaction("a").unwrap().liked, 2);
    assert_eq!(ctx.session.sum_total_interactions(), 1);
}

#[tokio::test]
async fn interrupted_run_saves_one_finished_session_matching_the_store() {
    let (dir, ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(2));
    let device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"]]);
    let (mut ctx, mut device) = shutdown_on(ctx, device, "like:a:1");
    let plan = RunPlan {
        sources: vec![source()],
        unfollow: true,
        ..Default::default()
    };

    let sessions = run(&mut ctx, &mut device, &plan, &Schedule::default())
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_finished());
    assert_eq!(device.count("open:b"), 0);

    let saved = ctx.storage.history().load().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id(), sessions[0].id());
    assert!(saved[0].is_finished());

    let reopened = Storage::open(dir.path(), "me").unwrap();
    let record = reopened.interaction("a").unwrap();
    assert_eq!(saved[0].total_likes(), record.liked);
    assert_eq!(saved[0].total_likes(), 2);
    assert_eq!(saved[0].sum_total_interactions(), reopened.interacted_count() as u32);
}

#[tokio::test]
async fn repeat_mode_runs_sessions_until_shutdown() {
    let (_dir, ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let (trigger, stop) = shutdown::channel();
    let mut sessions_started = 0;
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)])
        .page(&source(), &[&["a"]])
        .on("own", move || {
            sessions_started += 1;
            if sessions_started == 2 {
                trigger.trigger();
            }
        });
    let mut ctx = ctx.with_shutdown(stop);
    let plan = RunPlan {
        sources: vec![source()],
        ..Default::default()
    };
    let schedule = Schedule {
        repeat: Some(LimitValue::Fixed(0)),
        ..Default::default()
    };

    let sessions = run(&mut ctx, &mut device, &plan, &schedule).await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert_ne!(sessions[0].id(), sessions[1].id());
    assert!(sessions.iter().all(|s| s.is_finished()));
    assert_eq!(sessions[0].sum_total_interactions(), 1);
    assert_eq!(sessions[1].sum_total_interactions(), 0);
    assert_eq!(device.count("own"), 2);
    assert_eq!(ctx.storage.history().load().unwrap().len(), 2);
}

#[tokio::test]
async fn shutdown_while_waiting_for_working_hours_runs_nothing() {
    let (_dir, ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let (trigger, stop) = shutdown::channel();
    let (_now, clock) = movable_clock(9 * 60);
    let mut ctx = ctx
        .with_shutdown(stop)
        .with_working_hours(WorkingHours::parse_list("10.00-11.00").unwrap(), clock);
    trigger.trigger();
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)])
        .page(&source(), &[&["a"]]);
    let plan = RunPlan {
        sources: vec![source()],
        ..Default::default()
    };

    let sessions = run(&mut ctx, &mut device, &plan, &Schedule::default())
        .await
        .unwrap();

    assert!(sessions.is_empty());
    assert!(device.calls.is_empty());
    assert!(ctx.storage.history().load().unwrap().is_empty());
}

#[tokio::test]
async fn session_outside_working_hours_runs_no_job() {
    let (_dir, ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let (_now, clock) = movable_clock(12 * 60);
    let mut ctx =
        ctx.with_working_hours(WorkingHours::parse_list("10.00-11.00").unwrap(), clock);
    let mut device = ScriptedDevice::with_profiles(vec![profile("a", 300, 200, 10)])
        .page(&source(), &[&["a"]]);
    let plan = RunPlan {
        sources: vec![source()],
        ..Default::default()
    };

    let stopped = run_session(&mut ctx, &mut device, &plan).await.unwrap();

    assert_eq!(stopped, Some(StopReason::OutsideWorkingHours));
    assert_eq!(device.count("list:"), 0);
}

#[tokio::test]
async fn session_ends_when_working_hours_close_mid_job() {
    let (_dir, ctx) = context(SessionLimits::default(), FilterConfig::default(), settings(1));
    let second = Source::new("blogger-followers", "bob");
    let (now, clock) = movable_clock(10 * 60 + 30);
    let mut ctx =
        ctx.with_working_hours(WorkingHours::parse_list("10.00-11.00").unwrap(), clock);
    let mut device = ScriptedDevice::with_profiles(vec![
        profile("a", 300, 200, 10),
        profile("b", 300, 200, 10),
        profile("c", 300, 200, 10),
    ])
    .page(&source(), &[&["a", "b"]])
    .page(&second, &[&["c"]])
    .on("like:a:0", move || now.store(11 * 60 + 30, Ordering::SeqCst));
    let plan = RunPlan {
        sources: vec![source(), second],
        ..Default::default()
    };

    let stopped = run_session(&mut ctx, &mut device, &plan).await.unwrap();

    assert_eq!(stopped, Some(StopReason::OutsideWorkingHours));
    assert!(ctx.storage.was_interacted("a").0);
    assert_eq!(device.count("open:b"), 0);
    assert_eq!(device.count("open:c"), 0);
    assert_eq!(ctx.session.total_likes(), 1);
}
