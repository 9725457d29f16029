use anyhow::Result;
use deinemudda::config::{SETTINGS_ANTISPAM_ENABLED_KEY, SETTINGS_TRIGGER_PROBABILITY_KEY};
use deinemudda::persistence::{Chat, Persistence, PersistenceError, SqlPersistence, User};

async fn open() -> Result<SqlPersistence> {
    Ok(SqlPersistence::connect("sqlite::memory:").await?)
}

#[tokio::test]
async fn test_chat_round_trip_with_defaults() -> Result<()> {
    let db = open().await?;
    assert!(db.get_chat(1).await?.is_none());

    let mut chat = Chat::with_default_settings(1, "group");
    chat.upsert_member(User::new(10, "Anna").with_username("anna"));
    chat.upsert_member(User::new(11, "Bernd"));
    db.add_or_update_chat(&chat).await?;

    let stored = db.get_chat(1).await?.expect("chat stored");
    assert_eq!(stored.chat_type, "group");
    assert_eq!(
        stored.users.iter().map(|u| u.id).collect::<Vec<_>>(),
        vec![10, 11]
    );
    assert!(stored.antispam_enabled());
    assert!((stored.trigger_probability() - 0.02).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_setting_is_stored_once_per_key() -> Result<()> {
    let db = open().await?;
    let mut chat = Chat::with_default_settings(1, "group");
    db.add_or_update_chat(&chat).await?;

    chat.set_setting(SETTINGS_TRIGGER_PROBABILITY_KEY, "0.5");
    db.add_or_update_chat(&chat).await?;
    chat.set_setting(SETTINGS_ANTISPAM_ENABLED_KEY, "off");
    db.add_or_update_chat(&chat).await?;

    let stored = db.get_chat(1).await?.expect("chat stored");
    assert_eq!(stored.settings.len(), 2);
    assert!((stored.trigger_probability() - 0.5).abs() < f64::EPSILON);
    assert!(!stored.antispam_enabled());
    assert_eq!(db.entity_counts().await?.settings, 2);
    Ok(())
}

#[tokio::test]
async fn test_delete_chat_removes_orphaned_users_only() -> Result<()> {
    let db = open().await?;

    let mut first = Chat::new(1, "group");
    first.upsert_member(User::new(10, "Anna"));
    first.upsert_member(User::new(11, "Bernd"));
    db.add_or_update_chat(&first).await?;

    let mut second = Chat::new(2, "group");
    second.upsert_member(User::new(11, "Bernd"));
    db.add_or_update_chat(&second).await?;

    db.delete_chat(1).await?;

    assert!(db.get_chat(1).await?.is_none());
    assert!(db.get_user(10).await?.is_none());
    assert!(db.get_user(11).await?.is_some());

    let counts = db.entity_counts().await?;
    assert_eq!(counts.chats, 1);
    assert_eq!(counts.users, 1);
    assert_eq!(counts.users_per_chat, vec![(2, 1)]);
    Ok(())
}

#[tokio::test]
async fn test_member_update_keeps_moderation_state() -> Result<()> {
    let db = open().await?;
    db.add_or_update_chat(&Chat::new(1, "group")).await?;

    let mut user = User::new(10, "Anna");
    user.is_banned = true;
    db.add_or_update_user(&user).await?;

    db.add_or_update_chat_member(1, &User::new(10, "Anna-Lena").with_username("anna"))
        .await?;

    let stored = db.get_user(10).await?.expect("user stored");
    assert!(stored.is_banned);
    assert_eq!(stored.first_name, "Anna-Lena");
    assert_eq!(
        db.get_chat(1).await?.expect("chat stored").users.len(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn test_member_of_unknown_chat_is_rejected() -> Result<()> {
    let db = open().await?;
    let result = db.add_or_update_chat_member(5, &User::new(10, "Anna")).await;
    assert!(matches!(result, Err(PersistenceError::ChatNotFound(5))));
    Ok(())
}

#[tokio::test]
async fn test_remove_chat_member() -> Result<()> {
    let db = open().await?;
    let mut chat = Chat::new(1, "group");
    chat.upsert_member(User::new(10, "Anna"));
    db.add_or_update_chat(&chat).await?;

    db.remove_chat_member(1, 10).await?;

    assert!(db.get_chat(1).await?.expect("chat stored").users.is_empty());
    assert!(db.get_user(10).await?.is_some());
    assert_eq!(db.entity_counts().await?.users_per_chat, vec![(1, 0)]);
    Ok(())
}

#[tokio::test]
async fn test_user_lookup_by_username() -> Result<()> {
    let db = open().await?;
    db.add_or_update_user(&User::new(10, "Anna").with_username("AnnaBanana"))
        .await?;

    for query in ["AnnaBanana", "@annabanana", " annabanana "] {
        let user = db.get_user_by_username(query).await?;
        assert_eq!(user.map(|u| u.id), Some(10), "lookup of '{query}'");
    }
    assert!(db.get_user_by_username("@").await?.is_none());
    assert!(db.get_user_by_username("bernd").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_timeout_is_persisted() -> Result<()> {
    let db = open().await?;
    let at = chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");

    let mut user = User::new(10, "Anna");
    user.last_timeout = Some(at);
    db.add_or_update_user(&user).await?;

    let stored = db.get_user(10).await?.expect("user stored");
    assert_eq!(stored.last_timeout, Some(at));
    assert!(!stored.is_banned);
    Ok(())
}

#[tokio::test]
async fn test_response_ratings() -> Result<()> {
    let db = open().await?;
    assert!(!db.is_response_bad("WhyRule", "warum").await?);

    db.rate_response("WhyRule", "warum", true).await?;
    assert!(db.is_response_bad("WhyRule", "warum").await?);
    assert!(!db.is_response_bad("WhoEnglishRule", "warum").await?);

    db.rate_response("WhyRule", "warum", false).await?;
    assert!(!db.is_response_bad("WhyRule", "warum").await?);
    assert_eq!(db.entity_counts().await?.ratings, 1);
    Ok(())
}
