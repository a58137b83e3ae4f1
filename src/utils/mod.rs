//! Utility functions and helpers
//!
//! This module contains timestamp utilities and other helper functions.

pub mod time;

pub use time::{current_timestamp_millis, format_duration};
