//! Reliability patterns for step execution
//!
//! This module provides:
//! - [`RetryPolicy`] - Opt-in retry with exponential backoff

mod retry;

pub use retry::{RetryDecision, RetryPolicy, DEFAULT_MAX_RETRIES};
