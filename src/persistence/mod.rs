//! Persistence of chats, users, settings and response ratings.

/// Persisted entities
pub mod entity;
/// SQLite backed implementation
pub mod sqlite;

pub use entity::{Chat, Setting, User};
pub use sqlite::SqlPersistence;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Error while applying schema migrations
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// The referenced chat does not exist
    #[error("Chat {0} not found")]
    ChatNotFound(i64),
}

/// Number of stored entities, as shown by `/stats` and exported as gauges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityCounts {
    /// Known chats
    pub chats: i64,
    /// Known users
    pub users: i64,
    /// Stored chat settings
    pub settings: i64,
    /// Rated responses
    pub ratings: i64,
    /// Member count per chat id
    pub users_per_chat: Vec<(i64, i64)>,
}

/// Interface for the bot's persistent state.
///
/// Every call is its own unit of work and is rolled back if it fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Loads a chat with its members and settings
    async fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>, PersistenceError>;

    /// Stores a chat, its settings and its member list.
    ///
    /// Member profiles are refreshed, their moderation state is left untouched.
    async fn add_or_update_chat(&self, chat: &Chat) -> Result<(), PersistenceError>;

    /// Adds `user` to an existing chat, refreshing its profile
    async fn add_or_update_chat_member(
        &self,
        chat_id: i64,
        user: &User,
    ) -> Result<(), PersistenceError>;

    /// Removes a user from a chat's member list
    async fn remove_chat_member(&self, chat_id: i64, user_id: i64)
        -> Result<(), PersistenceError>;

    /// Deletes a chat and every former member that is no longer part of any chat
    async fn delete_chat(&self, chat_id: i64) -> Result<(), PersistenceError>;

    /// Loads a user by id
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, PersistenceError>;

    /// Loads a user by username, case-insensitive and with or without `@`
    async fn get_user_by_username(&self, username: &str)
        -> Result<Option<User>, PersistenceError>;

    /// Stores a user including its moderation state
    async fn add_or_update_user(&self, user: &User) -> Result<(), PersistenceError>;

    /// Whether a response of `rule_id` to `message` was rated bad
    async fn is_response_bad(&self, rule_id: &str, message: &str)
        -> Result<bool, PersistenceError>;

    /// Stores a rating for a response of `rule_id` to `message`
    async fn rate_response(
        &self,
        rule_id: &str,
        message: &str,
        is_bad: bool,
    ) -> Result<(), PersistenceError>;

    /// Counts stored entities
    async fn entity_counts(&self) -> Result<EntityCounts, PersistenceError>;
}
