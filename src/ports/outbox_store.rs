//! OutboxStore port - Durable storage for pending events.
//!
//! This port implements the storage half of the Transactional Outbox Pattern:
//!
//! 1. The business transaction inserts an outbox row next to its domain write
//! 2. Publisher workers claim batches of rows with a time-bounded lock
//! 3. Each delivery outcome is written back onto the row
//!
//! ## Claim Semantics
//!
//! `claim_batch` selects AND locks in one indivisible step. Any number of
//! workers may call it concurrently against the same store; a row is handed
//! to at most one of them until its `locked_until` elapses. A worker that
//! crashes mid-batch simply lets its locks expire.
//!
//! ## Outcome Semantics
//!
//! An outcome is only written while the row is still unprocessed and still
//! held by the writing worker. A worker that overran its lock cannot undo a
//! delivery or roll back the attempt count recorded by the reclaiming worker.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OutboxMessageId, Timestamp, WorkerId};
use crate::domain::outbox::{NewOutboxMessage, OutboxMessage};

/// Parameters for a single claim.
#[derive(Debug, Clone)]
pub struct ClaimRequest<'a> {
    /// Only rows with this `message_type` are considered.
    pub message_type: &'a str,

    /// Reference time for lock expiry checks.
    pub now: Timestamp,

    /// Upper bound on rows returned.
    pub batch_size: u32,

    /// New `locked_until` for every claimed row.
    pub lock_until: Timestamp,

    /// Stamped into `locked_by`.
    pub worker_id: &'a WorkerId,
}

/// Port for the outbox table.
///
/// # Example
///
/// ```ignore
/// let now = Timestamp::now();
/// let batch = store
///     .claim_batch(ClaimRequest {
///         message_type: UserCreatedMessage::MESSAGE_TYPE,
///         now,
///         batch_size: 50,
///         lock_until: now.plus_secs(30),
///         worker_id: &worker_id,
///     })
///     .await?;
///
/// // ... attempt delivery, mutate rows ...
///
/// let lost = store.persist_outcomes(&worker_id, &batch).await?;
/// ```
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Atomically select and lock up to `batch_size` claimable rows.
    ///
    /// Claimable means `processed_at IS NULL` and `locked_until` is null or
    /// strictly before `now`. Rows come back ordered by `created_at`, then
    /// `id`. When nothing is eligible the result is empty and nothing is
    /// written.
    async fn claim_batch(&self, request: ClaimRequest<'_>) -> Result<Vec<OutboxMessage>, DomainError>;

    /// Write back the outcome fields of exactly the given rows.
    ///
    /// Persists `processed_at`, `locked_until`, `locked_by`, `attempt_count`,
    /// `last_attempt_at`, `last_error` and `updated_at`, in one write.
    ///
    /// A row is only updated while `processed_at` is null and `locked_by`
    /// equals `worker_id`. Rows failing that guard (claim lost, or no such
    /// row) are left untouched and their ids returned; the remaining rows
    /// are still written.
    async fn persist_outcomes(
        &self,
        worker_id: &WorkerId,
        messages: &[OutboxMessage],
    ) -> Result<Vec<OutboxMessageId>, DomainError>;

    /// Insert a new pending row outside any business transaction.
    ///
    /// Production writers insert through their own transaction instead; this
    /// exists for tooling and tests.
    async fn enqueue(&self, message: NewOutboxMessage) -> Result<OutboxMessage, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn OutboxStore) {}
}
