use sqlx::SqliteConnection;

use crate::traits::{NewWebhookEvent, WebhookEvent};

pub async fn insert_event(event: NewWebhookEvent, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id: (i64,) = sqlx::query_as(
        r#"
            INSERT INTO webhook_events (provider, provider_reference, signature_valid, outcome, payload, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id;
        "#,
    )
    .bind(event.provider)
    .bind(event.provider_reference)
    .bind(event.signature_valid)
    .bind(event.outcome)
    .bind(event.payload)
    .bind(event.received_at)
    .fetch_one(conn)
    .await?;
    Ok(id.0)
}

pub async fn fetch_events(
    provider: Option<&str>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WebhookEvent>, sqlx::Error> {
    let events = match provider {
        Some(p) => {
            sqlx::query_as("SELECT * FROM webhook_events WHERE provider = $1 ORDER BY id DESC LIMIT $2")
                .bind(p)
                .bind(limit)
                .fetch_all(conn)
                .await?
        },
        None => sqlx::query_as("SELECT * FROM webhook_events ORDER BY id DESC LIMIT $1").bind(limit).fetch_all(conn).await?,
    };
    Ok(events)
}
