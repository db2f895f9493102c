// Working hours — time windows in which sessions may run.
//
// Windows are written `HH.MM-HH.MM` (a `:` separator also works). A window
// whose end is before its start wraps past midnight. Outside every window
// the runner sleeps until the next one opens instead of counting anything
// against a limit.

use std::str::FromStr;

use anyhow::Result;
use chrono::{Duration, NaiveTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    let (h, m) = s
        .split_once(['.', ':'])
        .ok_or_else(|| anyhow::anyhow!("Invalid time '{}': expected HH.MM", s))?;
    let h: u32 = h.trim().parse().map_err(|_| anyhow::anyhow!("Invalid hour in '{}'", s))?;
    let m: u32 = m.trim().parse().map_err(|_| anyhow::anyhow!("Invalid minute in '{}'", s))?;
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(|| anyhow::anyhow!("Time out of range: '{}'", s))
}

impl FromStr for TimeWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Invalid window '{}': expected HH.MM-HH.MM", s))?;
        Ok(TimeWindow {
            start: parse_time(start)?,
            end: parse_time(end)?,
        })
    }
}

impl TimeWindow {
    fn wraps(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start == self.end {
            return true;
        }
        if self.wraps() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }

    /// Time from `t` until this window next opens.
    pub fn until_open(&self, t: NaiveTime) -> Duration {
        let delta = self.start.signed_duration_since(t);
        if delta >= Duration::zero() {
            delta
        } else {
            delta + Duration::days(1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Inside,
    Outside { wait: Duration },
}

/// A set of allowed windows. No windows means always allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingHours {
    windows: Vec<TimeWindow>,
}

impl WorkingHours {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn new(windows: Vec<TimeWindow>) -> Self {
        Self { windows }
    }

    /// Parse a comma-separated window list, e.g. `"10.15-16.40,18.15-22.46"`.
    pub fn parse_list(s: &str) -> Result<Self> {
        let windows = s
            .split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(TimeWindow::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn check(&self, now: NaiveTime) -> WindowStatus {
        if self.windows.is_empty() || self.windows.iter().any(|w| w.contains(now)) {
            return WindowStatus::Inside;
        }
        let wait = self
            .windows
            .iter()
            .map(|w| w.until_open(now))
            .min()
            .unwrap_or_else(Duration::zero);
        WindowStatus::Outside { wait }
    }
}
