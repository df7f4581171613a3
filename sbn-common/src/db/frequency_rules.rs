//! Frequency rule persistence
//!
//! Durable copy of each group's rule, keyed by group name. Rows are
//! re-normalized on load, so a hand-edited row cannot yield an out-of-domain
//! rule.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::frequency::{
    format_time_of_day, parse_time_of_day, validate_group_name, FrequencyRule, FrequencySettings,
};
use crate::Result;

type RuleRow = (String, i64, i64, i64, String, String);

/// Load one group's rule, `None` if never configured
pub async fn load_frequency_rule(db: &SqlitePool, group: &str) -> Result<Option<FrequencyRule>> {
    let row: Option<RuleRow> = sqlx::query_as(
        "SELECT group_name, enabled, frequency_minutes, max_plays, start_time, end_time
         FROM frequency_rules WHERE group_name = ?",
    )
    .bind(group)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|row| rule_from_row(&row)))
}

/// Load every configured group's rule
pub async fn load_frequency_rules(db: &SqlitePool) -> Result<FrequencySettings> {
    let rows: Vec<RuleRow> = sqlx::query_as(
        "SELECT group_name, enabled, frequency_minutes, max_plays, start_time, end_time
         FROM frequency_rules ORDER BY group_name",
    )
    .fetch_all(db)
    .await?;

    let mut settings = FrequencySettings::new();
    for row in &rows {
        settings.insert(row.0.clone(), rule_from_row(row));
    }
    Ok(settings)
}

/// Insert or replace a group's rule
pub async fn save_frequency_rule(db: &SqlitePool, group: &str, rule: &FrequencyRule) -> Result<()> {
    validate_group_name(group)?;
    upsert_rule(db, group, rule).await?;

    debug!(group, "Saved frequency rule");
    Ok(())
}

/// Read-modify-write one group's rule in a single transaction
///
/// A group never configured starts from the default rule. The write lock is
/// taken before the read, so concurrent edits of the same group run one
/// after the other. An `edit` error rolls the transaction back.
pub async fn update_frequency_rule<F>(db: &SqlitePool, group: &str, edit: F) -> Result<FrequencyRule>
where
    F: FnOnce(FrequencyRule) -> Result<FrequencyRule>,
{
    validate_group_name(group)?;

    let defaults = FrequencyRule::default();
    let mut tx = db.begin().await?;

    // Seeding the default row is the first statement, so it takes the lock
    sqlx::query(
        r#"
        INSERT INTO frequency_rules
            (group_name, enabled, frequency_minutes, max_plays, start_time, end_time, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(group_name) DO NOTHING
        "#,
    )
    .bind(group)
    .bind(defaults.enabled())
    .bind(i64::from(defaults.frequency_minutes()))
    .bind(i64::from(defaults.max_plays()))
    .bind(format_time_of_day(defaults.start_time()))
    .bind(format_time_of_day(defaults.end_time()))
    .execute(&mut *tx)
    .await?;

    let row: RuleRow = sqlx::query_as(
        "SELECT group_name, enabled, frequency_minutes, max_plays, start_time, end_time
         FROM frequency_rules WHERE group_name = ?",
    )
    .bind(group)
    .fetch_one(&mut *tx)
    .await?;

    let rule = edit(rule_from_row(&row))?;
    upsert_rule(&mut *tx, group, &rule).await?;
    tx.commit().await?;

    debug!(group, "Updated frequency rule");
    Ok(rule)
}

async fn upsert_rule<'e, E>(executor: E, group: &str, rule: &FrequencyRule) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO frequency_rules
            (group_name, enabled, frequency_minutes, max_plays, start_time, end_time, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(group_name) DO UPDATE SET
            enabled = excluded.enabled,
            frequency_minutes = excluded.frequency_minutes,
            max_plays = excluded.max_plays,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(group)
    .bind(rule.enabled())
    .bind(i64::from(rule.frequency_minutes()))
    .bind(i64::from(rule.max_plays()))
    .bind(format_time_of_day(rule.start_time()))
    .bind(format_time_of_day(rule.end_time()))
    .execute(executor)
    .await?;
    Ok(())
}

fn rule_from_row(row: &RuleRow) -> FrequencyRule {
    let (group, enabled, frequency, max_plays, start, end) = row;
    let defaults = FrequencyRule::default();

    let start_time = parse_time_of_day(start).unwrap_or_else(|e| {
        warn!(group = %group, "Stored start_time unusable ({}), using default", e);
        defaults.start_time()
    });
    let end_time = parse_time_of_day(end).unwrap_or_else(|e| {
        warn!(group = %group, "Stored end_time unusable ({}), using default", e);
        defaults.end_time()
    });

    FrequencyRule::new(*enabled != 0, *frequency, *max_plays, start_time, end_time)
}
