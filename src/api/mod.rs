//! API module for HTTP endpoints
//!
//! This module exposes the artifact state operations over REST.

pub mod http;
pub mod rest;
pub mod state;
