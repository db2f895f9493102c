use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::device::Source;
use crate::filter::FilterConfig;
use crate::interaction::pacing::Pacing;
use crate::interaction::runner::{RunPlan, Schedule};
use crate::interaction::InteractionSettings;
use crate::session::{LimitValue, LimitsConfig, WorkingHours};

const PREFIX: &str = "GRAMKEEPER_";

/// Returns the default root for per-account folders.
/// Uses the platform data directory: ~/.local/share/gramkeeper/accounts/ on Linux.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("gramkeeper"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("accounts")
}

/// Central configuration loaded from environment variables.
///
/// Every variable is prefixed with `GRAMKEEPER_`. The .env file is loaded
/// automatically at startup via dotenvy. A value that is set but doesn't
/// parse is an error; an unset value falls back to its default.
#[derive(Debug, Clone)]
pub struct Config {
    /// The driven account. Required by `run` and the per-account commands.
    pub username: String,
    pub data_dir: PathBuf,
    pub limits: LimitsConfig,
    pub filter: FilterConfig,
    pub interaction: InteractionSettings,
    pub working_hours: WorkingHours,
    /// Minutes between sessions. Unset runs one session and exits.
    pub repeat: Option<LimitValue>,
    /// Scales every pacing sleep. 0 disables them.
    pub speed_multiplier: f64,
    pub sources: Vec<Source>,
    pub unfollow: bool,
    pub remove_mass_followers: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup (tests use a map).
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { get };

        let limits = LimitsConfig {
            likes: vars.parse("TOTAL_LIKES_LIMIT")?,
            follows: vars.parse("TOTAL_FOLLOWS_LIMIT")?,
            watches: vars.parse("TOTAL_WATCHES_LIMIT")?,
            comments: vars.parse("TOTAL_COMMENTS_LIMIT")?,
            pm: vars.parse("TOTAL_PM_LIMIT")?,
            unfollows: vars.parse("TOTAL_UNFOLLOWS_LIMIT")?,
            total: vars.parse("TOTAL_INTERACTIONS_LIMIT")?,
            success: vars.parse("TOTAL_SUCCESSFUL_INTERACTIONS_LIMIT")?,
            scraped: vars.parse("TOTAL_SCRAPED_LIMIT")?,
            per_source: vars.parse("INTERACTIONS_COUNT")?,
        };

        let filter = FilterConfig {
            min_followers: vars.parse("MIN_FOLLOWERS")?,
            max_followers: vars.parse("MAX_FOLLOWERS")?,
            min_following: vars.parse("MIN_FOLLOWING")?,
            max_following: vars.parse("MAX_FOLLOWING")?,
            min_potency_ratio: vars.parse("MIN_POTENCY_RATIO")?,
            skip_business: vars.flag("SKIP_BUSINESS")?.unwrap_or(false),
            skip_non_business: vars.flag("SKIP_NON_BUSINESS")?.unwrap_or(false),
            follow_private_or_empty: vars.flag("FOLLOW_PRIVATE_OR_EMPTY")?,
        };

        let defaults = InteractionSettings::default();
        let interaction = InteractionSettings {
            likes_count: vars.parse("LIKES_COUNT")?.unwrap_or(defaults.likes_count),
            stories_count: vars.parse("STORIES_COUNT")?.unwrap_or(defaults.stories_count),
            stories_percentage: vars.percentage("STORIES_PERCENTAGE")?,
            follow_percentage: vars.percentage("FOLLOW_PERCENTAGE")?,
            comment_percentage: vars.percentage("COMMENT_PERCENTAGE")?,
            pm_percentage: vars.percentage("PM_PERCENTAGE")?,
            max_comments_per_account: vars
                .parse("MAX_COMMENTS_PER_ACCOUNT")?
                .unwrap_or(defaults.max_comments_per_account),
            reinteract_after: vars
                .parse::<u32>("CAN_REINTERACT_AFTER")?
                .map(|hours| chrono::Duration::hours(i64::from(hours))),
            scrape_only: vars.flag("SCRAPE")?.unwrap_or(false),
            unfollow_delay: vars
                .parse::<u32>("UNFOLLOW_DELAY_DAYS")?
                .map(|days| chrono::Duration::days(i64::from(days)))
                .unwrap_or(defaults.unfollow_delay),
            max_following_for_removal: vars
                .parse("MAX_FOLLOWING_FOR_REMOVAL")?
                .unwrap_or(defaults.max_following_for_removal),
            repeats_to_end: vars
                .parse("REPEATS_TO_END")?
                .unwrap_or(defaults.repeats_to_end),
            skipped_list_limit: vars
                .parse("SKIPPED_LIST_LIMIT")?
                .unwrap_or(defaults.skipped_list_limit),
            skipped_fling_limit: vars
                .parse("SKIPPED_FLING_LIMIT")?
                .unwrap_or(defaults.skipped_fling_limit),
        };

        let working_hours = match vars.get("WORKING_HOURS") {
            Some(raw) => WorkingHours::parse_list(&raw)
                .with_context(|| format!("Invalid value for {PREFIX}WORKING_HOURS"))?,
            None => WorkingHours::always(),
        };

        let speed_multiplier: f64 = vars.parse("SPEED_MULTIPLIER")?.unwrap_or(1.0);
        if !speed_multiplier.is_finite() || speed_multiplier < 0.0 {
            anyhow::bail!("{PREFIX}SPEED_MULTIPLIER must be a non-negative number");
        }

        let sources = match vars.get("SOURCES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Source::parse)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Invalid value for {PREFIX}SOURCES"))?,
            None => Vec::new(),
        };

        Ok(Self {
            username: vars.get("USERNAME").unwrap_or_default(),
            data_dir: vars
                .get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            limits,
            filter,
            interaction,
            working_hours,
            repeat: vars.parse("REPEAT_MINUTES")?,
            speed_multiplier,
            sources,
            unfollow: vars.flag("UNFOLLOW")?.unwrap_or(false),
            remove_mass_followers: vars.flag("REMOVE_MASS_FOLLOWERS")?.unwrap_or(false),
        })
    }

    /// Check that the driven account is configured.
    /// Call this before any operation that reads or writes account data.
    pub fn require_username(&self) -> Result<()> {
        if self.username.is_empty() {
            anyhow::bail!(
                "{PREFIX}USERNAME not set. Add it to your .env file.\n\
                 It names the account whose data folder is used."
            );
        }
        Ok(())
    }

    pub fn run_plan(&self) -> RunPlan {
        RunPlan {
            sources: self.sources.clone(),
            unfollow: self.unfollow,
            remove_mass_followers: self.remove_mass_followers,
        }
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            repeat: self.repeat,
            limits: self.limits.clone(),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.speed_multiplier)
    }
}

struct Vars<F> {
    get: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value of `GRAMKEEPER_<name>`; blank counts as unset.
    fn get(&self, name: &str) -> Option<String> {
        (self.get)(&format!("{PREFIX}{name}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid value for {PREFIX}{name} ('{raw}'): {e}")),
            None => Ok(None),
        }
    }

    fn flag(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => Ok(None),
            Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
            Some("0" | "false" | "no" | "off") => Ok(Some(false)),
            Some(other) => anyhow::bail!("Invalid value for {PREFIX}{name} ('{other}'): expected true or false"),
        }
    }

    fn percentage(&self, name: &str) -> Result<u8> {
        let value: u8 = self.parse(name)?.unwrap_or(0);
        if value > 100 {
            anyhow::bail!("{PREFIX}{name} must be between 0 and 100, got {value}");
        }
        Ok(value)
    }
}
