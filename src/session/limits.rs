// Limit evaluator — decides whether a category of action is still allowed.
//
// Limits are configured as `N` or `N-M`. A range is rolled once when the
// session starts (SessionLimits) and stays fixed for the whole session.
// A limit that isn't configured is never reached.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// A configured numeric value: either fixed or a random inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitValue {
    Fixed(u32),
    Range(u32, u32),
}

impl LimitValue {
    /// Pick a concrete value. Fixed values are returned as-is.
    pub fn resolve<R: Rng>(&self, rng: &mut R) -> u32 {
        match *self {
            LimitValue::Fixed(n) => n,
            LimitValue::Range(min, max) => rng.random_range(min..=max),
        }
    }

    pub fn min(&self) -> u32 {
        match *self {
            LimitValue::Fixed(n) | LimitValue::Range(n, _) => n,
        }
    }
}

impl FromStr for LimitValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse = |part: &str| -> Result<u32> {
            part.trim()
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("Invalid limit value '{}': expected N or N-M", s))
        };

        match s.split_once('-') {
            None => Ok(LimitValue::Fixed(parse(s)?)),
            Some((lo, hi)) => {
                let (lo, hi) = (parse(lo)?, parse(hi)?);
                if lo > hi {
                    anyhow::bail!("Invalid limit range '{}': lower bound is above upper bound", s);
                }
                if lo == hi {
                    Ok(LimitValue::Fixed(lo))
                } else {
                    Ok(LimitValue::Range(lo, hi))
                }
            }
        }
    }
}

impl fmt::Display for LimitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitValue::Fixed(n) => write!(f, "{n}"),
            LimitValue::Range(lo, hi) => write!(f, "{lo}-{hi}"),
        }
    }
}

/// Action categories with their own ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    Likes,
    Follows,
    Watches,
    Comments,
    Pm,
    Unfollows,
    Total,
    Success,
    Scraped,
}

impl LimitKind {
    pub const ALL: [LimitKind; 9] = [
        LimitKind::Likes,
        LimitKind::Follows,
        LimitKind::Watches,
        LimitKind::Comments,
        LimitKind::Pm,
        LimitKind::Unfollows,
        LimitKind::Total,
        LimitKind::Success,
        LimitKind::Scraped,
    ];

    /// The per-candidate actions an interaction job performs.
    pub const ACTIONS: [LimitKind; 5] = [
        LimitKind::Likes,
        LimitKind::Follows,
        LimitKind::Watches,
        LimitKind::Comments,
        LimitKind::Pm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Likes => "likes",
            LimitKind::Follows => "follows",
            LimitKind::Watches => "watches",
            LimitKind::Comments => "comments",
            LimitKind::Pm => "pm",
            LimitKind::Unfollows => "unfollows",
            LimitKind::Total => "total interactions",
            LimitKind::Success => "successful interactions",
            LimitKind::Scraped => "scraped",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Limits as configured, before any range is rolled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitsConfig {
    pub likes: Option<LimitValue>,
    pub follows: Option<LimitValue>,
    pub watches: Option<LimitValue>,
    pub comments: Option<LimitValue>,
    pub pm: Option<LimitValue>,
    pub unfollows: Option<LimitValue>,
    pub total: Option<LimitValue>,
    pub success: Option<LimitValue>,
    pub scraped: Option<LimitValue>,
    /// Successful interactions allowed per source.
    pub per_source: Option<LimitValue>,
}

impl LimitsConfig {
    /// Roll every range once, producing the limits for one session.
    pub fn resolve<R: Rng>(&self, rng: &mut R) -> SessionLimits {
        let mut roll = |v: &Option<LimitValue>| v.map(|v| v.resolve(rng));
        SessionLimits {
            likes: roll(&self.likes),
            follows: roll(&self.follows),
            watches: roll(&self.watches),
            comments: roll(&self.comments),
            pm: roll(&self.pm),
            unfollows: roll(&self.unfollows),
            total: roll(&self.total),
            success: roll(&self.success),
            scraped: roll(&self.scraped),
            per_source: roll(&self.per_source),
        }
    }
}

/// Concrete ceilings for one session. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    pub likes: Option<u32>,
    pub follows: Option<u32>,
    pub watches: Option<u32>,
    pub comments: Option<u32>,
    pub pm: Option<u32>,
    pub unfollows: Option<u32>,
    pub total: Option<u32>,
    pub success: Option<u32>,
    pub scraped: Option<u32>,
    pub per_source: Option<u32>,
}

/// Aggregate limit view used by job loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllLimits {
    /// Every configured per-candidate action limit is exhausted, so an
    /// interaction job has nothing left to do.
    pub active_jobs: bool,
    /// The unfollow limit is exhausted.
    pub unfollows: bool,
    /// A session-ending limit (total, successful, scraped) is exhausted.
    pub terminal: bool,
    /// At least one configured limit of any kind is exhausted.
    pub any: bool,
}

impl SessionLimits {
    pub fn ceiling(&self, kind: LimitKind) -> Option<u32> {
        match kind {
            LimitKind::Likes => self.likes,
            LimitKind::Follows => self.follows,
            LimitKind::Watches => self.watches,
            LimitKind::Comments => self.comments,
            LimitKind::Pm => self.pm,
            LimitKind::Unfollows => self.unfollows,
            LimitKind::Total => self.total,
            LimitKind::Success => self.success,
            LimitKind::Scraped => self.scraped,
        }
    }

    fn counter(kind: LimitKind, session: &SessionState) -> u32 {
        match kind {
            LimitKind::Likes => session.total_likes(),
            LimitKind::Follows => session.sum_followed(),
            LimitKind::Watches => session.total_watched(),
            LimitKind::Comments => session.total_comments(),
            LimitKind::Pm => session.total_pm(),
            LimitKind::Unfollows => session.total_unfollowed(),
            LimitKind::Total => session.sum_total_interactions(),
            LimitKind::Success => session.sum_successful_interactions(),
            LimitKind::Scraped => session.sum_scraped(),
        }
    }

    /// Whether the limit for `kind` has been reached in `session`.
    pub fn check(&self, kind: LimitKind, session: &SessionState) -> bool {
        match self.ceiling(kind) {
            Some(max) => Self::counter(kind, session) >= max,
            None => false,
        }
    }

    /// How many more actions of `kind` fit in this session.
    /// `None` means unlimited.
    pub fn remaining(&self, kind: LimitKind, session: &SessionState) -> Option<u32> {
        self.ceiling(kind)
            .map(|max| max.saturating_sub(Self::counter(kind, session)))
    }

    /// Evaluate every limit at once.
    pub fn check_all(&self, session: &SessionState) -> AllLimits {
        let configured_actions: Vec<LimitKind> = LimitKind::ACTIONS
            .into_iter()
            .filter(|k| self.ceiling(*k).is_some())
            .collect();
        let active_jobs = !configured_actions.is_empty()
            && configured_actions.iter().all(|k| self.check(*k, session));

        let terminal = [LimitKind::Total, LimitKind::Success, LimitKind::Scraped]
            .into_iter()
            .any(|k| self.check(k, session));

        AllLimits {
            active_jobs,
            unfollows: self.check(LimitKind::Unfollows, session),
            terminal,
            any: LimitKind::ALL.into_iter().any(|k| self.check(k, session)),
        }
    }

    /// Whether `source` has used up its successful-interaction budget.
    /// Failed attempts don't count.
    pub fn source_exhausted(&self, source: &str, session: &SessionState) -> bool {
        match self.per_source {
            Some(max) => session.successful_interactions_for(source) >= max,
            None => false,
        }
    }
}
