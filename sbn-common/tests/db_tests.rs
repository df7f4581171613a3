//! Frequency rule persistence tests (SQLite)

use chrono::NaiveTime;
use sbn_common::db::{
    init_database, init_memory_database, load_frequency_rule, load_frequency_rules,
    save_frequency_rule, update_frequency_rule,
};
use sbn_common::frequency::{FrequencyRule, GROUP_ADS, GROUP_MUSIC};
use sbn_common::Error;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test]
async fn test_unconfigured_group_loads_none() {
    let pool = init_memory_database().await.unwrap();
    assert!(load_frequency_rule(&pool, GROUP_ADS).await.unwrap().is_none());
    assert!(load_frequency_rules(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_and_reload_rule() {
    let pool = init_memory_database().await.unwrap();
    let rule = FrequencyRule::default()
        .set_frequency("15")
        .set_max_plays("4")
        .set_start_time(t(22, 0))
        .set_end_time(t(2, 0))
        .set_enabled(false);

    save_frequency_rule(&pool, GROUP_ADS, &rule).await.unwrap();

    let loaded = load_frequency_rule(&pool, GROUP_ADS).await.unwrap();
    assert_eq!(loaded, Some(rule));
}

#[tokio::test]
async fn test_save_overwrites_existing_group() {
    let pool = init_memory_database().await.unwrap();
    save_frequency_rule(&pool, GROUP_MUSIC, &FrequencyRule::default()).await.unwrap();

    let edited = FrequencyRule::default().set_frequency("60");
    save_frequency_rule(&pool, GROUP_MUSIC, &edited).await.unwrap();

    let settings = load_frequency_rules(&pool).await.unwrap();
    assert_eq!(settings.len(), 1);
    assert_eq!(settings.get(GROUP_MUSIC).frequency_minutes(), 60);
}

#[tokio::test]
async fn test_load_all_groups() {
    let pool = init_memory_database().await.unwrap();
    save_frequency_rule(&pool, GROUP_MUSIC, &FrequencyRule::default()).await.unwrap();
    save_frequency_rule(&pool, GROUP_ADS, &FrequencyRule::default().set_max_plays("2")).await.unwrap();

    let settings = load_frequency_rules(&pool).await.unwrap();
    assert_eq!(settings.groups().collect::<Vec<_>>(), vec![GROUP_ADS, GROUP_MUSIC]);
    assert_eq!(settings.get(GROUP_ADS).max_plays(), 2);
}

#[tokio::test]
async fn test_hand_edited_row_is_normalized() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query(
        "INSERT INTO frequency_rules (group_name, enabled, frequency_minutes, max_plays, start_time, end_time)
         VALUES ('ads', 1, 9999, 0, 'noon', '02:00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let rule = load_frequency_rule(&pool, "ads").await.unwrap().unwrap();
    assert_eq!(rule.frequency_minutes(), 120);
    assert_eq!(rule.max_plays(), 10);
    assert_eq!(rule.start_time(), FrequencyRule::default().start_time());
    assert_eq!(rule.end_time(), t(2, 0));
}

#[tokio::test]
async fn test_invalid_group_name_rejected() {
    let pool = init_memory_database().await.unwrap();
    let result = save_frequency_rule(&pool, "bad group!", &FrequencyRule::default()).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("sbn-admin.db");

    {
        let pool = init_database(&db_path).await.unwrap();
        save_frequency_rule(&pool, GROUP_ADS, &FrequencyRule::default().set_frequency("45"))
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let rule = load_frequency_rule(&pool, GROUP_ADS).await.unwrap().unwrap();
    assert_eq!(rule.frequency_minutes(), 45);
}

#[tokio::test]
async fn test_update_starts_from_default_rule() {
    let pool = init_memory_database().await.unwrap();
    let rule = update_frequency_rule(&pool, GROUP_ADS, |rule| Ok(rule.set_max_plays("3")))
        .await
        .unwrap();

    assert_eq!(rule, FrequencyRule::default().set_max_plays("3"));
    assert_eq!(load_frequency_rule(&pool, GROUP_ADS).await.unwrap(), Some(rule));
}

#[tokio::test]
async fn test_update_edit_error_rolls_back() {
    let pool = init_memory_database().await.unwrap();
    let result = update_frequency_rule(&pool, GROUP_ADS, |_| {
        Err(Error::InvalidInput("bad time".to_string()))
    })
    .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    // The seeded default row is rolled back too
    assert!(load_frequency_rule(&pool, GROUP_ADS).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_updates_of_one_group_keep_both_edits() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("sbn-admin.db")).await.unwrap();

    for round in 0..10 {
        save_frequency_rule(&pool, GROUP_MUSIC, &FrequencyRule::default())
            .await
            .unwrap();

        let frequency = update_frequency_rule(&pool, GROUP_MUSIC, |rule| Ok(rule.set_frequency("90")));
        let plays = update_frequency_rule(&pool, GROUP_MUSIC, |rule| Ok(rule.set_max_plays("7")));
        let (a, b) = tokio::join!(frequency, plays);
        a.unwrap();
        b.unwrap();

        let rule = load_frequency_rule(&pool, GROUP_MUSIC).await.unwrap().unwrap();
        assert_eq!(rule.frequency_minutes(), 90, "round {}", round);
        assert_eq!(rule.max_plays(), 7, "round {}", round);
    }
}
