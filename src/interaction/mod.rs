// Interaction layer — decides what to do with each candidate account and
// drives jobs over account lists.
//
// All mutable state for a run lives in BotContext, which is passed
// explicitly to every job. Nothing here is global.

pub mod job;
pub mod mass_followers;
pub mod orchestrator;
pub mod pacing;
pub mod runner;
pub mod shutdown;
pub mod unfollow;

use std::sync::Arc;

use chrono::{Duration, Local, NaiveTime};
use thiserror::Error;

use crate::device::DeviceError;
use crate::filter::Filter;
use crate::scroll::{
    ScrollEndDetector, DEFAULT_REPEATS_TO_END, DEFAULT_SKIPPED_FLING_LIMIT,
    DEFAULT_SKIPPED_LIST_LIMIT,
};
use crate::session::{LimitValue, LimitsConfig, SessionLimits, SessionState, WindowStatus, WorkingHours};
use crate::storage::Storage;

use self::pacing::Pacing;
use self::shutdown::Shutdown;

/// Highest number of posts liked on one profile (one screen of the grid).
pub const MAX_LIKES_PER_ACCOUNT: u32 = 12;

/// Per-candidate behaviour settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSettings {
    /// Posts to like on each profile, capped at MAX_LIKES_PER_ACCOUNT.
    pub likes_count: LimitValue,
    pub stories_count: LimitValue,
    pub stories_percentage: u8,
    pub follow_percentage: u8,
    pub comment_percentage: u8,
    pub pm_percentage: u8,
    pub max_comments_per_account: u32,
    /// How long before an account may be interacted with again.
    /// `None` means never.
    pub reinteract_after: Option<Duration>,
    /// Only record visited accounts instead of interacting.
    pub scrape_only: bool,
    /// Minimum time between our follow and the unfollow.
    pub unfollow_delay: Duration,
    /// Followers following more accounts than this are removed by the
    /// mass-follower job.
    pub max_following_for_removal: u64,
    pub repeats_to_end: usize,
    pub skipped_list_limit: u32,
    pub skipped_fling_limit: u32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            likes_count: LimitValue::Range(1, 2),
            stories_count: LimitValue::Range(1, 2),
            stories_percentage: 0,
            follow_percentage: 0,
            comment_percentage: 0,
            pm_percentage: 0,
            max_comments_per_account: 1,
            reinteract_after: None,
            scrape_only: false,
            unfollow_delay: Duration::days(3),
            max_following_for_removal: 1_000,
            repeats_to_end: DEFAULT_REPEATS_TO_END,
            skipped_list_limit: DEFAULT_SKIPPED_LIST_LIMIT,
            skipped_fling_limit: DEFAULT_SKIPPED_FLING_LIMIT,
        }
    }
}

impl InteractionSettings {
    pub fn end_detector(&self) -> ScrollEndDetector {
        ScrollEndDetector::new(
            self.repeats_to_end,
            self.skipped_list_limit,
            self.skipped_fling_limit,
        )
    }
}

/// Source of the local time of day, checked against working hours.
pub type Clock = Arc<dyn Fn() -> NaiveTime + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().time())
}

/// Why a job or session stopped before running out of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    OutsideWorkingHours,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Interrupted => "interrupted",
            StopReason::OutsideWorkingHours => "outside working hours",
        }
    }
}

/// Everything a job needs, constructed once per process and handed around.
pub struct BotContext {
    pub storage: Storage,
    pub session: SessionState,
    pub limits: SessionLimits,
    pub filter: Filter,
    pub settings: InteractionSettings,
    pub pacing: Pacing,
    pub shutdown: Shutdown,
    pub working_hours: WorkingHours,
    pub clock: Clock,
}

impl BotContext {
    pub fn new(
        storage: Storage,
        limits: SessionLimits,
        filter: Filter,
        settings: InteractionSettings,
        pacing: Pacing,
    ) -> Self {
        let mut session = SessionState::new();
        session.set_limits(limits);
        Self {
            storage,
            session,
            limits,
            filter,
            settings,
            pacing,
            shutdown: Shutdown::never(),
            working_hours: WorkingHours::always(),
            clock: local_clock(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_working_hours(mut self, working_hours: WorkingHours, clock: Clock) -> Self {
        self.working_hours = working_hours;
        self.clock = clock;
        self
    }

    pub fn window_status(&self) -> WindowStatus {
        self.working_hours.check((self.clock)())
    }

    /// Checked between accounts and between jobs. Work already started on
    /// an account is always finished and reported first.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.shutdown.is_requested() {
            return Some(StopReason::Interrupted);
        }
        match self.window_status() {
            WindowStatus::Inside => None,
            WindowStatus::Outside { .. } => Some(StopReason::OutsideWorkingHours),
        }
    }

    /// Replace the current session with a fresh one and re-roll limits.
    /// Returns the previous session.
    pub fn start_new_session(&mut self, limits: &LimitsConfig) -> SessionState {
        self.limits = limits.resolve(&mut rand::rng());
        let mut session = SessionState::new();
        session.set_limits(self.limits);
        std::mem::replace(&mut self.session, session)
    }
}

/// Errors that end a job early.
///
/// Storage failures are fatal for the whole process; device failures are
/// dispatched by the runner.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Roll a percentage chance.
pub(crate) fn roll(percentage: u8) -> bool {
    use rand::Rng;
    match percentage {
        0 => false,
        p if p >= 100 => true,
        p => rand::rng().random_range(0..100u8) < p,
    }
}
