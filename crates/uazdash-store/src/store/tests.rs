use super::{Store, DELAY_CONFIG_KEY};
use uazdash_core::delay::{DelayConfig, DelayPreset};
use uazdash_core::error::UazError;

#[tokio::test]
async fn test_put_and_get_raw() {
    let store = Store::in_memory().await.unwrap();
    assert!(store.get_raw("missing").await.unwrap().is_none());
    store.put_raw("k", "1").await.unwrap();
    store.put_raw("k", "2").await.unwrap();
    assert_eq!(store.get_raw("k").await.unwrap().as_deref(), Some("2"));
}

#[tokio::test]
async fn test_delay_config_defaults_when_unsaved() {
    let store = Store::in_memory().await.unwrap();
    let cfg = store.load_delay_config().await.unwrap();
    assert_eq!(cfg, DelayConfig::default());
}

#[tokio::test]
async fn test_delay_config_save_reload_equal() {
    let store = Store::in_memory().await.unwrap();
    let cfg = DelayConfig {
        delay_before_sending: 4.5,
        delay_between_messages: 2.25,
        delay_between_chars: 0.07,
        enable_safe_mode: false,
        randomize_delays: true,
        max_random_variation: 1.5,
    };
    store.save_delay_config(&cfg).await.unwrap();
    // A fresh handle over the same database, as after a restart.
    let reopened = store.clone();
    assert_eq!(reopened.load_delay_config().await.unwrap(), cfg);
}

#[tokio::test]
async fn test_seguro_preset_persisted_verbatim() {
    let store = Store::in_memory().await.unwrap();
    let cfg = "seguro".parse::<DelayPreset>().unwrap().config();
    store.save_delay_config(&cfg).await.unwrap();

    let raw = store.get_raw(DELAY_CONFIG_KEY).await.unwrap().unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["delayBeforeSending"], 5.0);
    assert_eq!(v["delayBetweenMessages"], 3.0);
    assert_eq!(v["enableSafeMode"], true);
    assert_eq!(serde_json::from_value::<DelayConfig>(v).unwrap(), cfg);
}

#[tokio::test]
async fn test_save_overwrites_fully() {
    let store = Store::in_memory().await.unwrap();
    store
        .save_delay_config(&DelayPreset::VerySafe.config())
        .await
        .unwrap();
    store
        .save_delay_config(&DelayPreset::Fast.config())
        .await
        .unwrap();
    assert_eq!(
        store.load_delay_config().await.unwrap(),
        DelayPreset::Fast.config()
    );
}

#[tokio::test]
async fn test_invalid_delay_config_not_saved() {
    let store = Store::in_memory().await.unwrap();
    let cfg = DelayConfig {
        delay_between_messages: -1.0,
        ..DelayConfig::default()
    };
    let err = store.save_delay_config(&cfg).await.unwrap_err();
    assert!(matches!(err, UazError::Validation(_)));
    assert!(store.get_raw(DELAY_CONFIG_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_over_long_delay_config_not_saved() {
    let store = Store::in_memory().await.unwrap();
    let cfg = DelayConfig {
        delay_before_sending: 1e30,
        ..DelayConfig::default()
    };
    let err = store.save_delay_config(&cfg).await.unwrap_err();
    assert!(matches!(err, UazError::Validation(_)));
    assert!(store.get_raw(DELAY_CONFIG_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_out_of_range_stored_delay_config_falls_back() {
    let store = Store::in_memory().await.unwrap();
    let mut v = serde_json::to_value(DelayConfig::default()).unwrap();
    v["delayBeforeSending"] = serde_json::json!(1e30);
    store
        .put_raw(DELAY_CONFIG_KEY, &v.to_string())
        .await
        .unwrap();
    assert_eq!(
        store.load_delay_config().await.unwrap(),
        DelayConfig::default()
    );
}

#[tokio::test]
async fn test_unreadable_delay_config_falls_back() {
    let store = Store::in_memory().await.unwrap();
    store.put_raw(DELAY_CONFIG_KEY, "[]").await.unwrap();
    assert_eq!(
        store.load_delay_config().await.unwrap(),
        DelayConfig::default()
    );
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let store = Store::in_memory().await.unwrap();
    Store::run_migrations(store.pool()).await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}
