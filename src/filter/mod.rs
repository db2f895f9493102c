// Candidate filter — static thresholds deciding whether an account is
// worth interacting with at all.
//
// Every configured condition must hold. Anything left unconfigured passes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public profile numbers of a candidate account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
    pub is_business: bool,
    pub is_private: bool,
}

impl CandidateMetrics {
    /// Private accounts and accounts without posts show nothing to like.
    pub fn is_private_or_empty(&self) -> bool {
        self.is_private || self.posts == 0
    }

    /// followers / following. `None` when the account follows nobody.
    pub fn potency_ratio(&self) -> Option<f64> {
        if self.following == 0 {
            None
        } else {
            Some(self.followers as f64 / self.following as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    pub min_followers: Option<u64>,
    pub max_followers: Option<u64>,
    pub min_following: Option<u64>,
    pub max_following: Option<u64>,
    pub min_potency_ratio: Option<f64>,
    pub skip_business: bool,
    pub skip_non_business: bool,
    /// `Some(false)` rejects private or empty accounts.
    pub follow_private_or_empty: Option<bool>,
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooFewFollowers,
    TooManyFollowers,
    TooFewFollowing,
    TooManyFollowing,
    LowPotency,
    Business,
    NonBusiness,
    PrivateOrEmpty,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TooFewFollowers => "too_few_followers",
            SkipReason::TooManyFollowers => "too_many_followers",
            SkipReason::TooFewFollowing => "too_few_following",
            SkipReason::TooManyFollowing => "too_many_following",
            SkipReason::LowPotency => "low_potency",
            SkipReason::Business => "business_account",
            SkipReason::NonBusiness => "non_business_account",
            SkipReason::PrivateOrEmpty => "private_or_empty",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    config: FilterConfig,
}

impl Filter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Check every configured threshold, returning the first failure.
    pub fn check(&self, m: &CandidateMetrics) -> Result<(), SkipReason> {
        let c = &self.config;

        if c.follow_private_or_empty == Some(false) && m.is_private_or_empty() {
            return Err(SkipReason::PrivateOrEmpty);
        }
        if c.skip_business && m.is_business {
            return Err(SkipReason::Business);
        }
        if c.skip_non_business && !m.is_business {
            return Err(SkipReason::NonBusiness);
        }
        if c.min_followers.is_some_and(|min| m.followers < min) {
            return Err(SkipReason::TooFewFollowers);
        }
        if c.max_followers.is_some_and(|max| m.followers > max) {
            return Err(SkipReason::TooManyFollowers);
        }
        if c.min_following.is_some_and(|min| m.following < min) {
            return Err(SkipReason::TooFewFollowing);
        }
        if c.max_following.is_some_and(|max| m.following > max) {
            return Err(SkipReason::TooManyFollowing);
        }
        if let Some(min_ratio) = c.min_potency_ratio {
            // Following nobody gives no ratio to compare: reject.
            match m.potency_ratio() {
                Some(ratio) if ratio >= min_ratio => {}
                _ => return Err(SkipReason::LowPotency),
            }
        }

        Ok(())
    }

    pub fn accepts(&self, m: &CandidateMetrics) -> bool {
        self.check(m).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(followers: u64, following: u64) -> CandidateMetrics {
        CandidateMetrics {
            followers,
            following,
            posts: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_config_accepts_everything() {
        let filter = Filter::default();
        assert!(filter.accepts(&metrics(0, 0)));
        assert!(filter.accepts(&CandidateMetrics {
            is_private: true,
            ..metrics(5, 5)
        }));
    }

    #[test]
    fn test_potency_ratio_boundary() {
        let filter = Filter::new(FilterConfig {
            min_potency_ratio: Some(1.5),
            ..Default::default()
        });
        assert!(filter.accepts(&metrics(150, 100)));
        assert_eq!(filter.check(&metrics(149, 100)), Err(SkipReason::LowPotency));
    }

    #[test]
    fn test_zero_following_fails_potency() {
        let filter = Filter::new(FilterConfig {
            min_potency_ratio: Some(1.0),
            ..Default::default()
        });
        assert_eq!(filter.check(&metrics(0, 0)), Err(SkipReason::LowPotency));
        assert_eq!(filter.check(&metrics(500, 0)), Err(SkipReason::LowPotency));
    }

    #[test]
    fn test_business_flags() {
        let skip_business = Filter::new(FilterConfig {
            skip_business: true,
            ..Default::default()
        });
        let shop = CandidateMetrics {
            is_business: true,
            ..metrics(10, 10)
        };
        assert_eq!(skip_business.check(&shop), Err(SkipReason::Business));
        assert!(skip_business.accepts(&metrics(10, 10)));

        let skip_personal = Filter::new(FilterConfig {
            skip_non_business: true,
            ..Default::default()
        });
        assert!(skip_personal.accepts(&shop));
        assert_eq!(
            skip_personal.check(&metrics(10, 10)),
            Err(SkipReason::NonBusiness)
        );
    }

    #[test]
    fn test_private_or_empty_rejected_when_disabled() {
        let filter = Filter::new(FilterConfig {
            follow_private_or_empty: Some(false),
            ..Default::default()
        });
        let empty = CandidateMetrics {
            posts: 0,
            ..metrics(10, 10)
        };
        assert_eq!(filter.check(&empty), Err(SkipReason::PrivateOrEmpty));
    }
}
