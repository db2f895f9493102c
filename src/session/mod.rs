// Session bookkeeping — counters for the current run, the limits that
// bound them, and the working-hours windows sessions are allowed in.

pub mod limits;
pub mod state;
pub mod working_hours;

pub use limits::{AllLimits, LimitKind, LimitValue, LimitsConfig, SessionLimits};
pub use state::{ProfileSnapshot, SessionState};
pub use working_hours::{WindowStatus, WorkingHours};
