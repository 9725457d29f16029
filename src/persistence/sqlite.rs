use super::{Chat, EntityCounts, Persistence, PersistenceError, Setting, User};
use crate::stats;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info, warn};

const USER_COLUMNS: &str = "users.id, users.username, users.first_name, users.full_name, \
                            users.last_timeout, users.is_banned";

/// [`Persistence`] backed by an SQLite database
#[derive(Clone)]
pub struct SqlPersistence {
    pool: SqlitePool,
}

impl SqlPersistence {
    /// Opens the database at `database_url` and applies pending migrations.
    ///
    /// `sqlite::memory:` (or plain `:memory:`) opens a private in-memory
    /// database kept alive on a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database cannot be opened
    /// or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let url = if database_url == ":memory:" {
            "sqlite::memory:"
        } else {
            database_url
        };
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        let persistence = Self { pool };
        persistence.migrate().await?;
        Ok(persistence)
    }

    /// Wraps an existing pool; migrations are not applied
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied.");
        Ok(())
    }

    /// Publishes entity counts to the metrics gauges
    async fn refresh_gauges(&self) {
        match self.entity_counts().await {
            Ok(counts) => stats::record_entity_counts(&counts),
            Err(e) => warn!("Failed to refresh entity gauges: {e}"),
        }
    }

    async fn chat_exists(
        tx: &mut Transaction<'_, Sqlite>,
        chat_id: i64,
    ) -> Result<bool, PersistenceError> {
        let row = sqlx::query("SELECT 1 FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }

    async fn upsert_profile(
        tx: &mut Transaction<'_, Sqlite>,
        user: &User,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO users (id, username, first_name, full_name) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET username = excluded.username, \
             first_name = excluded.first_name, full_name = excluded.full_name",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.full_name)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn upsert_setting(
        tx: &mut Transaction<'_, Sqlite>,
        chat_id: i64,
        setting: &Setting,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO settings (chat_id, key, value) VALUES (?, ?, ?) \
             ON CONFLICT (chat_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(chat_id)
        .bind(&setting.key)
        .bind(&setting.value)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for SqlPersistence {
    async fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>, PersistenceError> {
        let Some(row) = sqlx::query("SELECT id, type FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM association \
             JOIN users ON users.id = association.user_id \
             WHERE association.chat_id = ? ORDER BY association.rowid"
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        let settings = sqlx::query("SELECT key, value FROM settings WHERE chat_id = ? ORDER BY id")
            .bind(chat_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| {
                Ok(Setting {
                    key: row.try_get("key")?,
                    value: row.try_get("value")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(Chat {
            id: row.try_get("id")?,
            chat_type: row.try_get("type")?,
            users,
            settings,
        }))
    }

    async fn add_or_update_chat(&self, chat: &Chat) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chats (id, type) VALUES (?, ?) \
             ON CONFLICT (id) DO UPDATE SET type = excluded.type",
        )
        .bind(chat.id)
        .bind(&chat.chat_type)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM association WHERE chat_id = ?")
            .bind(chat.id)
            .execute(&mut *tx)
            .await?;
        for user in &chat.users {
            Self::upsert_profile(&mut tx, user).await?;
            sqlx::query("INSERT OR IGNORE INTO association (chat_id, user_id) VALUES (?, ?)")
                .bind(chat.id)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM settings WHERE chat_id = ?")
            .bind(chat.id)
            .execute(&mut *tx)
            .await?;
        for setting in &chat.settings {
            Self::upsert_setting(&mut tx, chat.id, setting).await?;
        }

        tx.commit().await?;
        debug!(chat_id = chat.id, "Chat stored");
        self.refresh_gauges().await;
        Ok(())
    }

    async fn add_or_update_chat_member(
        &self,
        chat_id: i64,
        user: &User,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        if !Self::chat_exists(&mut tx, chat_id).await? {
            return Err(PersistenceError::ChatNotFound(chat_id));
        }

        Self::upsert_profile(&mut tx, user).await?;
        sqlx::query("INSERT OR IGNORE INTO association (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.refresh_gauges().await;
        Ok(())
    }

    async fn remove_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM association WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        self.refresh_gauges().await;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: i64) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let member_ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM association WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM association WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM settings WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        let mut orphans = 0_u64;
        for user_id in member_ids {
            orphans += sqlx::query(
                "DELETE FROM users WHERE id = ? \
                 AND NOT EXISTS (SELECT 1 FROM association WHERE user_id = ?)",
            )
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        info!(chat_id, orphans, "Chat deleted");
        stats::clear_chat_members(chat_id);
        self.refresh_gauges().await;
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, PersistenceError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE users.id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, PersistenceError> {
        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return Ok(None);
        }
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(users.username) = lower(?) LIMIT 1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn add_or_update_user(&self, user: &User) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, username, first_name, full_name, last_timeout, is_banned) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET username = excluded.username, \
             first_name = excluded.first_name, full_name = excluded.full_name, \
             last_timeout = excluded.last_timeout, is_banned = excluded.is_banned",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.full_name)
        .bind(user.last_timeout)
        .bind(user.is_banned)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.refresh_gauges().await;
        Ok(())
    }

    async fn is_response_bad(
        &self,
        rule_id: &str,
        message: &str,
    ) -> Result<bool, PersistenceError> {
        let is_bad: Option<bool> = sqlx::query_scalar(
            "SELECT is_bad FROM response_ratings WHERE rule_id = ? AND message = ?",
        )
        .bind(rule_id)
        .bind(message)
        .fetch_optional(&self.pool)
        .await?;
        Ok(is_bad.unwrap_or(false))
    }

    async fn rate_response(
        &self,
        rule_id: &str,
        message: &str,
        is_bad: bool,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO response_ratings (rule_id, message, is_bad) VALUES (?, ?, ?) \
             ON CONFLICT (rule_id, message) DO UPDATE SET is_bad = excluded.is_bad",
        )
        .bind(rule_id)
        .bind(message)
        .bind(is_bad)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn entity_counts(&self) -> Result<EntityCounts, PersistenceError> {
        let chats: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool)
            .await?;
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let settings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&self.pool)
            .await?;
        let ratings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM response_ratings")
            .fetch_one(&self.pool)
            .await?;
        let users_per_chat = sqlx::query(
            "SELECT chats.id AS chat_id, COUNT(association.user_id) AS members FROM chats \
             LEFT JOIN association ON association.chat_id = chats.id \
             GROUP BY chats.id ORDER BY chats.id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| Ok((row.try_get("chat_id")?, row.try_get("members")?)))
        .collect::<Result<Vec<(i64, i64)>, sqlx::Error>>()?;

        Ok(EntityCounts {
            chats,
            users,
            settings,
            ratings,
            users_per_chat,
        })
    }
}
