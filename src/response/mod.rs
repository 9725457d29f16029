//! Selecting a canned response for a chat message.

/// Adjective phrase extraction
pub mod adjective;
/// Sent responses awaiting a rating
pub mod answers;
/// The rule trait and its context
pub mod rule;
/// Built-in rules
pub mod rules;

pub use answers::AnswerLog;
pub use rule::{ResponseContext, ResponseRule};

use crate::persistence::{Chat, Persistence, PersistenceError};
use crate::stats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// A response chosen by a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Id of the rule that produced the response
    pub rule_id: String,
    /// Response text, unformatted
    pub text: String,
    /// Normalized message that triggered the response, the key for ratings
    pub trigger: String,
}

/// Manages response rules
pub struct ResponseManager {
    persistence: Arc<dyn Persistence>,
    rules: Vec<Box<dyn ResponseRule>>,
    rng: Mutex<StdRng>,
}

impl ResponseManager {
    /// Creates a manager with the built-in rules
    #[must_use]
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self::with_rules(persistence, rules::default_rules(), StdRng::from_os_rng())
    }

    /// Creates a manager with custom rules and a given random source.
    ///
    /// Rules are ordered by descending priority, keeping the given order
    /// between rules of equal priority.
    #[must_use]
    pub fn with_rules(
        persistence: Arc<dyn Persistence>,
        mut rules: Vec<Box<dyn ResponseRule>>,
        rng: StdRng,
    ) -> Self {
        rules.sort_by(|a, b| b.priority().total_cmp(&a.priority()));
        Self {
            persistence,
            rules,
            rng: Mutex::new(rng),
        }
    }

    /// Rules in the order they are checked
    #[must_use]
    pub fn rules(&self) -> &[Box<dyn ResponseRule>] {
        &self.rules
    }

    /// Lowercases `message`, drops characters outside `a-z 0-9 | ? äöüß`
    /// and collapses whitespace
    #[must_use]
    pub fn normalize(message: &str) -> String {
        let filtered: String = message
            .to_lowercase()
            .chars()
            .filter_map(|c| {
                if c.is_whitespace() {
                    Some(' ')
                } else if c.is_ascii_lowercase()
                    || c.is_ascii_digit()
                    || matches!(c, '|' | '?' | 'ä' | 'ö' | 'ü' | 'ß')
                {
                    Some(c)
                } else {
                    None
                }
            })
            .collect();
        filtered.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Finds a response to `message`, subject to the chat's trigger probability.
    ///
    /// # Errors
    ///
    /// Returns an error if looking up a response rating fails.
    pub async fn find_response(
        &self,
        chat: &Chat,
        sender: &str,
        message: &str,
    ) -> Result<Option<Response>, PersistenceError> {
        let draw: f64 = self.with_rng(|rng| rng.random());
        if draw >= chat.trigger_probability() {
            return Ok(None);
        }
        self.scan(chat, sender, message).await
    }

    /// Finds a response to `message`, ignoring the trigger probability.
    ///
    /// # Errors
    ///
    /// Returns an error if looking up a response rating fails.
    pub async fn force_response(
        &self,
        chat: &Chat,
        sender: &str,
        message: &str,
    ) -> Result<Option<Response>, PersistenceError> {
        self.scan(chat, sender, message).await
    }

    async fn scan(
        &self,
        chat: &Chat,
        sender: &str,
        message: &str,
    ) -> Result<Option<Response>, PersistenceError> {
        let normalized = Self::normalize(message);
        let context = ResponseContext::new(chat, sender);

        for rule in &self.rules {
            if !rule.matches(message) {
                continue;
            }
            let Some(text) =
                self.with_rng(|rng| rule.get_response(&context, &normalized, rng))
            else {
                continue;
            };
            if self
                .persistence
                .is_response_bad(rule.id(), &normalized)
                .await?
            {
                debug!(rule = rule.id(), "Skipping response rated bad");
                continue;
            }

            debug!(rule = rule.id(), chat_id = chat.id, "Rule matched");
            stats::record_response(chat.id, rule.id());
            return Ok(Some(Response {
                rule_id: rule.id().to_string(),
                text,
                trigger: normalized,
            }));
        }
        Ok(None)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}
