// Gramkeeper: session limits and interaction bookkeeping for a driven
// social-media account.
//
// This is the library root. Each module corresponds to a major subsystem
// of the decision layer; the device itself sits behind the `device` trait.

pub mod config;
pub mod device;
pub mod filter;
pub mod interaction;
pub mod output;
pub mod scroll;
pub mod session;
pub mod status;
pub mod storage;
