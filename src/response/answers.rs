//! Remembers which rule produced which sent message, so operators can rate
//! an answer by replying to it.

use super::Response;
use crate::persistence::{Persistence, PersistenceError};
use moka::future::Cache;
use std::time::Duration;
use tracing::info;

const MAX_REMEMBERED_ANSWERS: u64 = 10_000;
const ANSWER_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Recently sent responses keyed by `(chat id, message id)`
pub struct AnswerLog {
    answers: Cache<(i64, i32), Response>,
}

impl Default for AnswerLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerLog {
    /// Creates an empty log
    #[must_use]
    pub fn new() -> Self {
        Self {
            answers: Cache::builder()
                .max_capacity(MAX_REMEMBERED_ANSWERS)
                .time_to_live(ANSWER_TTL)
                .build(),
        }
    }

    /// Remembers that `message_id` in `chat_id` carries `response`
    pub async fn remember(&self, chat_id: i64, message_id: i32, response: Response) {
        self.answers.insert((chat_id, message_id), response).await;
    }

    /// The response sent as `message_id` in `chat_id`, if still remembered
    pub async fn get(&self, chat_id: i64, message_id: i32) -> Option<Response> {
        self.answers.get(&(chat_id, message_id)).await
    }

    /// Stores a rating for the response sent as `message_id`.
    ///
    /// Returns the rated response, or `None` if the message is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the rating cannot be stored.
    pub async fn rate(
        &self,
        persistence: &dyn Persistence,
        chat_id: i64,
        message_id: i32,
        is_bad: bool,
    ) -> Result<Option<Response>, PersistenceError> {
        let Some(response) = self.get(chat_id, message_id).await else {
            return Ok(None);
        };
        persistence
            .rate_response(&response.rule_id, &response.trigger, is_bad)
            .await?;
        info!(
            chat_id,
            message_id,
            rule = %response.rule_id,
            is_bad,
            "Response rated"
        );
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MockPersistence;
    use mockall::predicate::eq;

    fn why_response() -> Response {
        Response {
            rule_id: "WhyRule".to_string(),
            text: "sex".to_string(),
            trigger: "warum".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rate_stores_rule_and_trigger() {
        let mut persistence = MockPersistence::new();
        persistence
            .expect_rate_response()
            .with(eq("WhyRule"), eq("warum"), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let log = AnswerLog::new();
        log.remember(-1, 17, why_response()).await;

        let rated = log
            .rate(&persistence, -1, 17, true)
            .await
            .expect("rating stored");
        assert_eq!(rated, Some(why_response()));
    }

    #[tokio::test]
    async fn test_unknown_message_is_not_rated() {
        let mut persistence = MockPersistence::new();
        persistence.expect_rate_response().never();

        let log = AnswerLog::new();
        log.remember(-1, 17, why_response()).await;

        assert_eq!(log.rate(&persistence, -1, 18, true).await.expect("no error"), None);
        assert_eq!(log.rate(&persistence, -2, 17, true).await.expect("no error"), None);
    }
}
