#![deny(missing_docs)]
//! deinemudda: a Telegram bot that answers questions with "deine mudda".
//!
//! Antispam, a priority ordered response rule pipeline, SQLite persistence,
//! admin commands and Prometheus metrics.

/// Per-user message rate limiting
pub mod antispam;
/// Telegram handlers and commands
pub mod bot;
/// Configuration management
pub mod config;
/// Logging setup with secret redaction
pub mod logging;
/// Chats, users, settings and ratings
pub mod persistence;
/// Response rules and their selection
pub mod response;
/// Dispatcher wiring
pub mod runner;
/// Prometheus metrics
pub mod stats;
/// Utility functions
pub mod utils;
