//! # blueprint
//!
//! Application layer around `blueprint-core`: HTTP API, CLI, config and
//! file loading. Exposed as a library so integration tests can build the
//! router directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod loader;
