//! In-memory outbox store for tests and local runs.
//!
//! The whole table sits behind one mutex, so selecting and locking a batch
//! happens under a single critical section - the in-process equivalent of
//! `FOR UPDATE SKIP LOCKED`.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::domain::foundation::{DomainError, ErrorCode, OutboxMessageId, Timestamp, WorkerId};
use crate::domain::outbox::{NewOutboxMessage, OutboxMessage};
use crate::ports::{ClaimRequest, OutboxStore};

/// Outbox table held in process memory.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryOutboxStore::new());
/// store.enqueue(UserCreatedMessage::new(user_id, email).to_outbox()?).await?;
///
/// let publisher = OutboxPublisher::new(store.clone(), producer);
/// publisher.publish_once().await?;
///
/// assert!(store.all()?[0].is_processed());
/// ```
#[derive(Default)]
pub struct InMemoryOutboxStore {
    rows: Mutex<Vec<OutboxMessage>>,
}

impl InMemoryOutboxStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, Vec<OutboxMessage>>, DomainError> {
        self.rows.lock().map_err(|_| {
            DomainError::new(ErrorCode::InternalError, "In-memory outbox lock poisoned")
        })
    }

    /// Inserts a fully-formed row as-is (e.g. an already processed one).
    pub fn insert(&self, message: OutboxMessage) -> Result<(), DomainError> {
        self.rows()?.push(message);
        Ok(())
    }

    /// Snapshot of every row in insertion order.
    pub fn all(&self) -> Result<Vec<OutboxMessage>, DomainError> {
        Ok(self.rows()?.clone())
    }

    /// Snapshot of a single row.
    pub fn get(&self, id: &OutboxMessageId) -> Result<Option<OutboxMessage>, DomainError> {
        Ok(self.rows()?.iter().find(|m| &m.id == id).cloned())
    }

    /// Number of rows not yet delivered.
    pub fn pending_count(&self) -> Result<usize, DomainError> {
        Ok(self.rows()?.iter().filter(|m| !m.is_processed()).count())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn claim_batch(&self, request: ClaimRequest<'_>) -> Result<Vec<OutboxMessage>, DomainError> {
        let mut rows = self.rows()?;

        let mut eligible: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, m)| m.message_type == request.message_type && m.is_claimable(&request.now))
            .map(|(idx, _)| idx)
            .collect();

        eligible.sort_by(|a, b| {
            let (a, b) = (&rows[*a], &rows[*b]);
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        eligible.truncate(request.batch_size as usize);

        let claimed = eligible
            .into_iter()
            .map(|idx| {
                let row = &mut rows[idx];
                row.claim(request.worker_id, request.now, request.lock_until);
                row.clone()
            })
            .collect();

        Ok(claimed)
    }

    async fn persist_outcomes(
        &self,
        worker_id: &WorkerId,
        messages: &[OutboxMessage],
    ) -> Result<Vec<OutboxMessageId>, DomainError> {
        let mut rows = self.rows()?;
        let mut lost = Vec::new();

        for message in messages {
            let held = rows.iter_mut().find(|m| {
                m.id == message.id
                    && !m.is_processed()
                    && m.locked_by.as_deref() == Some(worker_id.as_str())
            });

            match held {
                Some(row) => {
                    row.processed_at = message.processed_at;
                    row.locked_until = message.locked_until;
                    row.locked_by = message.locked_by.clone();
                    row.attempt_count = message.attempt_count;
                    row.last_attempt_at = message.last_attempt_at;
                    row.last_error = message.last_error.clone();
                    row.updated_at = message.updated_at;
                }
                None => lost.push(message.id),
            }
        }

        Ok(lost)
    }

    async fn enqueue(&self, message: NewOutboxMessage) -> Result<OutboxMessage, DomainError> {
        let row = message.into_message(OutboxMessageId::new(), Timestamp::now());
        self.rows()?.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outbox::BackoffPolicy;
    use serde_json::json;
    use uuid::Uuid;

    fn row(message_type: &str, created_at: Timestamp) -> OutboxMessage {
        NewOutboxMessage::new("Auth", message_type, "k", json!({}))
            .unwrap()
            .into_message(OutboxMessageId::new(), created_at)
    }

    fn claim<'a>(worker: &'a WorkerId, now: Timestamp, batch_size: u32) -> ClaimRequest<'a> {
        ClaimRequest {
            message_type: "X",
            now,
            batch_size,
            lock_until: now.plus_secs(30),
            worker_id: worker,
        }
    }

    #[tokio::test]
    async fn claim_on_empty_store_returns_nothing() {
        let store = InMemoryOutboxStore::new();
        let worker = WorkerId::new("w").unwrap();

        let batch = store.claim_batch(claim(&worker, Timestamp::now(), 50)).await.unwrap();

        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn claim_orders_by_created_at_then_id() {
        let store = InMemoryOutboxStore::new();
        let base = Timestamp::now();

        let late = row("X", base.plus_secs(10));
        let mut tie_a = row("X", base);
        let mut tie_b = row("X", base);
        tie_a.id = OutboxMessageId::from_uuid(Uuid::from_u128(1));
        tie_b.id = OutboxMessageId::from_uuid(Uuid::from_u128(2));

        store.insert(late.clone()).unwrap();
        store.insert(tie_b.clone()).unwrap();
        store.insert(tie_a.clone()).unwrap();

        let worker = WorkerId::new("w").unwrap();
        let batch = store
            .claim_batch(claim(&worker, base.plus_secs(20), 50))
            .await
            .unwrap();

        let ids: Vec<_> = batch.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![tie_a.id, tie_b.id, late.id]);
    }

    #[tokio::test]
    async fn claim_respects_batch_size_and_type() {
        let store = InMemoryOutboxStore::new();
        let now = Timestamp::now();
        for _ in 0..5 {
            store.insert(row("X", now)).unwrap();
        }
        store.insert(row("Y", now)).unwrap();

        let worker = WorkerId::new("w").unwrap();
        let batch = store.claim_batch(claim(&worker, now, 3)).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|m| m.message_type == "X"));

        let rest = store.claim_batch(claim(&worker, now, 50)).await.unwrap();
        assert_eq!(rest.len(), 2);
    }

    #[tokio::test]
    async fn claim_stamps_lock_fields_on_stored_rows() {
        let store = InMemoryOutboxStore::new();
        let now = Timestamp::now();
        let stored = row("X", now);
        store.insert(stored.clone()).unwrap();

        let worker = WorkerId::new("worker-a").unwrap();
        store.claim_batch(claim(&worker, now, 50)).await.unwrap();

        let after = store.get(&stored.id).unwrap().unwrap();
        assert_eq!(after.locked_by.as_deref(), Some("worker-a"));
        assert_eq!(after.locked_until, Some(now.plus_secs(30)));
    }

    #[tokio::test]
    async fn processed_rows_are_never_claimed() {
        let store = InMemoryOutboxStore::new();
        let now = Timestamp::now();
        let mut done = row("X", now);
        done.mark_published(now);
        store.insert(done).unwrap();

        let worker = WorkerId::new("w").unwrap();
        let batch = store
            .claim_batch(claim(&worker, now.plus_secs(3600), 50))
            .await
            .unwrap();

        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn persist_outcomes_reports_unknown_rows_as_lost() {
        let store = InMemoryOutboxStore::new();
        let worker = WorkerId::new("w").unwrap();
        let stranger = row("X", Timestamp::now());

        let lost = store.persist_outcomes(&worker, &[stranger.clone()]).await.unwrap();

        assert_eq!(lost, vec![stranger.id]);
        assert!(store.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_outcomes_does_not_touch_payload() {
        let store = InMemoryOutboxStore::new();
        let now = Timestamp::now();
        store.insert(row("X", now)).unwrap();

        let worker = WorkerId::new("w").unwrap();
        let mut batch = store.claim_batch(claim(&worker, now, 50)).await.unwrap();
        batch[0].payload = json!({"tampered": true});
        batch[0].mark_published(now);
        let lost = store.persist_outcomes(&worker, &batch).await.unwrap();

        assert!(lost.is_empty());
        let after = store.get(&batch[0].id).unwrap().unwrap();
        assert!(after.is_processed());
        assert_eq!(after.payload, json!({}));
    }

    #[tokio::test]
    async fn stale_outcome_cannot_unretire_a_delivered_row() {
        let store = InMemoryOutboxStore::new();
        let t0 = Timestamp::now();
        store.insert(row("X", t0)).unwrap();

        let slow = WorkerId::new("slow").unwrap();
        let fast = WorkerId::new("fast").unwrap();

        let mut stale = store.claim_batch(claim(&slow, t0, 50)).await.unwrap();

        let t1 = t0.plus_secs(31);
        let mut fresh = store.claim_batch(claim(&fast, t1, 50)).await.unwrap();
        fresh[0].mark_published(t1);
        assert!(store.persist_outcomes(&fast, &fresh).await.unwrap().is_empty());

        stale[0].record_failure(t1.plus_secs(1), "late failure", &BackoffPolicy::default());
        let lost = store.persist_outcomes(&slow, &stale).await.unwrap();

        assert_eq!(lost, vec![stale[0].id]);
        let after = store.get(&stale[0].id).unwrap().unwrap();
        assert_eq!(after.processed_at, Some(t1));
        assert_eq!(after.attempt_count, 0);
        assert!(after.last_error.is_none());
    }

    #[tokio::test]
    async fn stale_outcome_cannot_lower_attempt_count() {
        let store = InMemoryOutboxStore::new();
        let policy = BackoffPolicy::default();
        let t0 = Timestamp::now();
        store.insert(row("X", t0)).unwrap();

        let slow = WorkerId::new("slow").unwrap();
        let fast = WorkerId::new("fast").unwrap();

        let mut stale = store.claim_batch(claim(&slow, t0, 50)).await.unwrap();

        let t1 = t0.plus_secs(31);
        let mut fresh = store.claim_batch(claim(&fast, t1, 50)).await.unwrap();
        fresh[0].record_failure(t1, "first", &policy);
        fresh[0].record_failure(t1, "second", &policy);
        store.persist_outcomes(&fast, &fresh).await.unwrap();

        stale[0].record_failure(t1.plus_secs(1), "late failure", &policy);
        let lost = store.persist_outcomes(&slow, &stale).await.unwrap();

        assert_eq!(lost.len(), 1);
        let after = store.get(&stale[0].id).unwrap().unwrap();
        assert_eq!(after.attempt_count, 2);
        assert_eq!(after.locked_by.as_deref(), Some("fast"));
        assert_eq!(after.last_error.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn lost_row_does_not_block_the_rest_of_the_batch() {
        let store = InMemoryOutboxStore::new();
        let now = Timestamp::now();
        store.insert(row("X", now)).unwrap();

        let worker = WorkerId::new("w").unwrap();
        let mut batch = store.claim_batch(claim(&worker, now, 50)).await.unwrap();
        batch.push(row("X", now));
        for message in batch.iter_mut() {
            message.mark_published(now);
        }

        let lost = store.persist_outcomes(&worker, &batch).await.unwrap();

        assert_eq!(lost, vec![batch[1].id]);
        assert!(store.get(&batch[0].id).unwrap().unwrap().is_processed());
    }
}
