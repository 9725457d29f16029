/// Command argument parsing
pub mod argument;
/// Supported commands
pub mod commands;
/// Message, command and membership handlers
pub mod handlers;
/// Reply texts and formatting
pub mod messaging;
/// Command permissions
pub mod permissions;
/// Telegram calls with retry
pub mod resilient;

pub use commands::Command;

use crate::antispam::AntiSpam;
use crate::config::Settings;
use crate::persistence::Persistence;
use crate::response::{AnswerLog, ResponseManager};
use crate::stats::Metrics;
use std::sync::Arc;

/// Everything the handlers need, shared across updates
pub struct BotContext {
    /// Loaded configuration
    pub settings: Arc<Settings>,
    /// Persistent state
    pub persistence: Arc<dyn Persistence>,
    /// Spam tracking
    pub antispam: AntiSpam,
    /// Response rules
    pub responses: ResponseManager,
    /// Sent responses that can still be rated
    pub answers: AnswerLog,
    /// Prometheus handle, read by `/stats`
    pub metrics: Metrics,
}

impl BotContext {
    /// Wires the components together
    #[must_use]
    pub fn new(settings: Arc<Settings>, persistence: Arc<dyn Persistence>, metrics: Metrics) -> Self {
        Self {
            antispam: AntiSpam::new(persistence.clone(), &settings.antispam),
            responses: ResponseManager::new(persistence.clone()),
            answers: AnswerLog::new(),
            settings,
            persistence,
            metrics,
        }
    }
}
