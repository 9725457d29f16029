//! Per-user message rate limiting with timeout and ban escalation.
//!
//! Each user's recent message timestamps live in a `moka` cache keyed by user
//! id. Penalties are persisted on the [`User`] so they survive restarts.

use crate::config::{AntiSpamSettings, ANTISPAM_MAX_TIMEOUT_SECS, ANTISPAM_MAX_WINDOW_MS};
use crate::persistence::{Persistence, PersistenceError, User};
use chrono::{DateTime, TimeDelta, Utc};
use moka::future::Cache;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const MAX_TRACKED_USERS: u64 = 10_000;

/// Outcome of checking a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamVerdict {
    /// Not spam
    Clean,
    /// Spam from a user who is already timed out or banned; no new penalty
    Suppressed,
    /// The user exceeded the rate limit and was timed out
    TimedOut,
    /// The user exceeded the rate limit during a timeout and was banned
    Banned,
}

impl SpamVerdict {
    /// Whether the message must be ignored
    #[must_use]
    pub const fn is_spam(self) -> bool {
        !matches!(self, Self::Clean)
    }
}

/// Keeps track of message rates to decide if someone is spamming
pub struct AntiSpam {
    persistence: Arc<dyn Persistence>,
    windows: Cache<i64, VecDeque<DateTime<Utc>>>,
    window: TimeDelta,
    message_threshold: usize,
    timeout: TimeDelta,
}

impl AntiSpam {
    /// Creates a tracker using the given tuning
    #[must_use]
    pub fn new(persistence: Arc<dyn Persistence>, settings: &AntiSpamSettings) -> Self {
        let window = settings
            .window()
            .min(Duration::from_millis(ANTISPAM_MAX_WINDOW_MS));
        let timeout = settings
            .timeout()
            .min(Duration::from_secs(ANTISPAM_MAX_TIMEOUT_SECS));
        let windows = Cache::builder()
            .max_capacity(MAX_TRACKED_USERS)
            .time_to_idle(window.max(Duration::from_secs(1)))
            .build();

        Self {
            persistence,
            windows,
            window: to_time_delta(window),
            message_threshold: settings.message_threshold,
            timeout: to_time_delta(timeout),
        }
    }

    /// Processes a message sent by `user_id` in `chat_id` at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the chat or user, or persisting a
    /// penalty fails.
    pub async fn process_message(
        &self,
        chat_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<SpamVerdict, PersistenceError> {
        let Some(chat) = self.persistence.get_chat(chat_id).await? else {
            return Ok(SpamVerdict::Clean);
        };
        if !chat.antispam_enabled() {
            return Ok(SpamVerdict::Clean);
        }

        let user = self.persistence.get_user(user_id).await?;
        if user.as_ref().is_some_and(|u| u.is_banned) {
            return Ok(SpamVerdict::Suppressed);
        }

        let count = self.record(user_id, at).await;
        let timed_out = user
            .as_ref()
            .is_some_and(|u| u.is_timed_out(at, self.timeout));

        if count <= self.message_threshold {
            return Ok(if timed_out {
                SpamVerdict::Suppressed
            } else {
                SpamVerdict::Clean
            });
        }

        let mut user = user.unwrap_or_else(|| User::new(user_id, String::new()));
        self.windows.invalidate(&user_id).await;

        if timed_out {
            user.is_banned = true;
            self.persistence.add_or_update_user(&user).await?;
            info!(chat_id, user_id, count, "User banned for spamming during timeout");
            Ok(SpamVerdict::Banned)
        } else {
            user.last_timeout = Some(at);
            self.persistence.add_or_update_user(&user).await?;
            info!(chat_id, user_id, count, "User timed out for spamming");
            Ok(SpamVerdict::TimedOut)
        }
    }

    /// How long a timeout lasts
    #[must_use]
    pub const fn timeout(&self) -> TimeDelta {
        self.timeout
    }

    /// Drops the tracked message window of a user
    pub async fn forget(&self, user_id: i64) {
        self.windows.invalidate(&user_id).await;
    }

    /// Appends `at` to the user's window and returns the number of messages
    /// inside `(at - window, at]`
    async fn record(&self, user_id: i64, at: DateTime<Utc>) -> usize {
        let cutoff = at
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let entry = self
            .windows
            .entry(user_id)
            .and_upsert_with(|existing| {
                let mut times = existing.map(|e| e.into_value()).unwrap_or_default();
                times.retain(|t| *t > cutoff);
                times.push_back(at);
                std::future::ready(times)
            })
            .await;

        let count = entry.value().iter().filter(|t| **t <= at).count();
        debug!(user_id, count, "Message recorded");
        count
    }
}

fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
