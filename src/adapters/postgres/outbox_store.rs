//! PostgreSQL implementation of OutboxStore.
//!
//! The claim is a single statement: a CTE picks eligible ids with
//! `FOR UPDATE SKIP LOCKED` and the outer `UPDATE` stamps the lock on exactly
//! those rows. Concurrent workers skip each other's rows instead of waiting.
//!
//! Outcome updates are fenced on `processed_at IS NULL AND locked_by = worker`;
//! a zero-row update means the claim was lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, OutboxMessageId, Timestamp, WorkerId};
use crate::domain::outbox::{NewOutboxMessage, OutboxMessage};
use crate::ports::{ClaimRequest, OutboxStore};

const RETURNED_COLUMNS: &str = "id, topic_key, message_type, key, payload, created_at, updated_at, \
     processed_at, locked_until, locked_by, attempt_count, last_attempt_at, last_error";

/// PostgreSQL implementation of OutboxStore.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Creates a new PostgresOutboxStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a row inside the caller's transaction.
    ///
    /// This is how business code writes events: the row commits or rolls
    /// back together with the domain change.
    pub async fn enqueue_in_txn(
        tx: &mut Transaction<'_, Postgres>,
        message: NewOutboxMessage,
    ) -> Result<OutboxMessage, DomainError> {
        insert_message(&mut **tx, message).await
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn claim_batch(&self, request: ClaimRequest<'_>) -> Result<Vec<OutboxMessage>, DomainError> {
        let sql = format!(
            r#"
            WITH candidates AS (
                SELECT id FROM outbox_messages
                WHERE processed_at IS NULL
                  AND (locked_until IS NULL OR locked_until < $2)
                  AND message_type = $1
                ORDER BY created_at, id
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox_messages AS o SET
                locked_until = $4,
                locked_by = $5,
                updated_at = $2
            FROM candidates
            WHERE o.id = candidates.id
            RETURNING {}
            "#,
            prefixed_columns("o")
        );

        let rows: Vec<OutboxMessageRow> = sqlx::query_as(&sql)
            .bind(request.message_type)
            .bind(request.now.as_datetime())
            .bind(i64::from(request.batch_size))
            .bind(request.lock_until.as_datetime())
            .bind(request.worker_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("claim outbox batch", e))?;

        // RETURNING carries no ordering guarantee.
        let mut batch = rows
            .into_iter()
            .map(OutboxMessage::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        batch.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(batch)
    }

    async fn persist_outcomes(
        &self,
        worker_id: &WorkerId,
        messages: &[OutboxMessage],
    ) -> Result<Vec<OutboxMessageId>, DomainError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("begin outcome transaction", e))?;

        let mut lost = Vec::new();
        for message in messages {
            let result = sqlx::query(
                r#"
                UPDATE outbox_messages SET
                    processed_at = $3,
                    locked_until = $4,
                    locked_by = $5,
                    attempt_count = $6,
                    last_attempt_at = $7,
                    last_error = $8,
                    updated_at = $9
                WHERE id = $1
                  AND processed_at IS NULL
                  AND locked_by = $2
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(worker_id.as_str())
            .bind(message.processed_at.map(|t| *t.as_datetime()))
            .bind(message.locked_until.map(|t| *t.as_datetime()))
            .bind(message.locked_by.as_deref())
            .bind(attempt_count_to_db(message.attempt_count)?)
            .bind(message.last_attempt_at.map(|t| *t.as_datetime()))
            .bind(message.last_error.as_deref())
            .bind(message.updated_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("persist outbox outcome", e))?;

            if result.rows_affected() == 0 {
                lost.push(message.id);
            }
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("commit outcome transaction", e))?;

        Ok(lost)
    }

    async fn enqueue(&self, message: NewOutboxMessage) -> Result<OutboxMessage, DomainError> {
        insert_message(&self.pool, message).await
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Row mapping
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct OutboxMessageRow {
    id: Uuid,
    topic_key: String,
    message_type: String,
    key: String,
    payload: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
    locked_by: Option<String>,
    attempt_count: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl TryFrom<OutboxMessageRow> for OutboxMessage {
    type Error = DomainError;

    fn try_from(row: OutboxMessageRow) -> Result<Self, Self::Error> {
        let attempt_count = u32::try_from(row.attempt_count).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Negative attempt_count on outbox message {}", row.id),
            )
        })?;

        Ok(OutboxMessage {
            id: OutboxMessageId::from_uuid(row.id),
            topic_key: row.topic_key,
            message_type: row.message_type,
            key: row.key,
            payload: row.payload,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            locked_until: row.locked_until.map(Timestamp::from_datetime),
            locked_by: row.locked_by,
            attempt_count,
            last_attempt_at: row.last_attempt_at.map(Timestamp::from_datetime),
            last_error: row.last_error,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

async fn insert_message<'e, E>(executor: E, message: NewOutboxMessage) -> Result<OutboxMessage, DomainError>
where
    E: PgExecutor<'e>,
{
    let row = message.into_message(OutboxMessageId::new(), Timestamp::now());

    let sql = format!(
        r#"
        INSERT INTO outbox_messages (
            id, topic_key, message_type, key, payload, created_at, updated_at, attempt_count
        ) VALUES ($1, $2, $3, $4, $5, $6, $6, 0)
        RETURNING {}
        "#,
        RETURNED_COLUMNS
    );

    let stored: OutboxMessageRow = sqlx::query_as(&sql)
        .bind(row.id.as_uuid())
        .bind(&row.topic_key)
        .bind(&row.message_type)
        .bind(&row.key)
        .bind(&row.payload)
        .bind(row.created_at.as_datetime())
        .fetch_one(executor)
        .await
        .map_err(|e| DomainError::database("insert outbox message", e))?;

    OutboxMessage::try_from(stored)
}

fn prefixed_columns(alias: &str) -> String {
    RETURNED_COLUMNS
        .split(", ")
        .map(|column| format!("{}.{}", alias, column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn attempt_count_to_db(count: u32) -> Result<i32, DomainError> {
    i32::try_from(count).map_err(|_| {
        DomainError::new(
            ErrorCode::OutOfRange,
            format!("attempt_count {} exceeds column range", count),
        )
    })
}
