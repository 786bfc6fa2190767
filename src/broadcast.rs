use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// One line of the public feed. Rows are append-only: `has_been_broadcast`
/// flips to 1 exactly once and nothing is ever edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub id: i64,
    pub text: String,
}

pub async fn init_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS broadcast_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL,
            has_been_broadcast INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn append(pool: &SqlitePool, text: &str) -> sqlx::Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO broadcast_events (data, has_been_broadcast, created_at)
        VALUES (?, 0, ?)
        "#,
    )
    .bind(text)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Claims up to `limit` undelivered rows, newest first, marking them
/// delivered in the same statement. The claim and the flag flip are one
/// write, so concurrent pollers serialize on the database's write lock and
/// any given row reaches exactly one of them.
pub async fn poll_undelivered(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<BroadcastEvent>> {
    let rows = sqlx::query(
        r#"
        UPDATE broadcast_events
        SET has_been_broadcast = 1
        WHERE id IN (
            SELECT id FROM broadcast_events
            WHERE has_been_broadcast = 0
            ORDER BY id DESC
            LIMIT ?
        )
        RETURNING id, data
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut events: Vec<BroadcastEvent> = rows
        .into_iter()
        .map(|row| BroadcastEvent { id: row.get("id"), text: row.get("data") })
        .collect();

    // RETURNING does not promise the subquery's order.
    events.sort_by(|a, b| b.id.cmp(&a.id));

    Ok(events)
}

/// Already-shown history, newest first. Only used to backfill a viewer that
/// just connected.
pub async fn recent_delivered(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<BroadcastEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, data FROM broadcast_events
        WHERE has_been_broadcast = 1
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| BroadcastEvent { id: row.get("id"), text: row.get("data") })
        .collect())
}
