//! Core model and evaluation logic for agentboard.
//!
//! - [`types`]: insights, inbox messages and threshold records
//! - [`thresholds`]: bounds check and the source threshold table
//! - [`scoring`]: composite relevance score
//! - [`evaluator`]: per-agent qualification rules
//! - [`catalog`]: built-in mock feed and threshold tables
//! - [`config`]: TOML configuration

pub mod catalog;
pub mod clock;
pub mod config;
pub mod evaluator;
pub mod scoring;
pub mod thresholds;
pub mod types;
