//! Background process that feeds the agent inbox.
//!
//! - Polling driver that evaluates the insight source on an interval
//! - Banner auto-dismiss and badge refresh loops
//! - Cooperative shutdown on ctrl-c

pub mod daemon;
pub mod poller;
pub mod shutdown;
