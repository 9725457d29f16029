use crate::persistence::Chat;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

/// A predicate and response pair deciding if and how the bot replies
pub trait ResponseRule: Send + Sync {
    /// Unique identifier, used for metrics and ratings
    fn id(&self) -> &'static str;

    /// What this rule is about
    fn description(&self) -> &'static str;

    /// Rules with a higher priority are checked first
    fn priority(&self) -> f64 {
        0.0
    }

    /// Whether this rule applies to the raw `message`
    fn matches(&self, message: &str) -> bool;

    /// Builds a response to the normalized `message`.
    ///
    /// Returns `None` if the rule has nothing to say after all.
    fn get_response(
        &self,
        context: &ResponseContext<'_>,
        message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String>;
}

/// Where a message was sent and by whom
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    /// Chat the message was sent in
    pub chat: &'a Chat,
    /// Display name of the sender
    pub sender: &'a str,
}

impl<'a> ResponseContext<'a> {
    /// Creates a new context
    #[must_use]
    pub const fn new(chat: &'a Chat, sender: &'a str) -> Self {
        Self { chat, sender }
    }

    /// First name of a random chat member
    pub fn random_member_name(&self, rng: &mut dyn RngCore) -> Option<&'a str> {
        self.chat
            .users
            .choose(rng)
            .map(|user| user.first_name.as_str())
    }

    /// With a 1-in-4 chance, the first name of a random chat member
    pub fn maybe_member_name(&self, rng: &mut dyn RngCore) -> Option<&'a str> {
        if rng.random_range(0..4) == 3 {
            self.random_member_name(rng)
        } else {
            None
        }
    }
}
