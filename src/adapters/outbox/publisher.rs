//! OutboxPublisher - Background service that drains the outbox to the broker.
//!
//! Each iteration:
//! 1. **Claims** up to `batch_size` rows of one message type with a
//!    time-bounded lock
//! 2. **Sends** claimed rows, one by one, through the `MessageProducer`, for
//!    as long as a send can still finish inside the claim's lock
//! 3. **Persists** the outcome of the sent rows in one write
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `batch_size` | 50 | Max rows claimed per iteration |
//! | `lock_duration` | 30s | Exclusive ownership window of a claim |
//! | `idle_delay` | 300ms | Pause after an empty claim |
//! | `error_delay` | 2s | Pause after a failed iteration |
//! | `send_timeout` | 10s | Upper bound on a single send |
//! | `backoff` | 2s x n, max 60s | Retry delay after the n-th failure |
//!
//! ## Graceful Shutdown
//!
//! The shutdown signal is checked before every claim and interrupts the
//! idle/error pauses. A batch that is already claimed is always sent and
//! persisted before the loop exits, so no lock is left dangling by a clean
//! stop.
//!
//! ## Delivery Guarantee
//!
//! At-least-once. A crash after a successful send but before the outcome
//! write leaves the row unprocessed; it is sent again once its lock lapses.
//! Rows the batch had no time left for are not sent at all and are picked up
//! again after their lock lapses. If a row was reclaimed anyway, the store
//! discards this worker's outcome for it and the row counts as `lost`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, WorkerId};
use crate::domain::outbox::{BackoffPolicy, OutboxEvent, OutboxMessage};
use crate::ports::{ClaimRequest, MessageProducer, OutboxStore};

/// Configuration for the OutboxPublisher service.
#[derive(Debug, Clone)]
pub struct OutboxPublisherConfig {
    /// Maximum rows claimed per iteration.
    pub batch_size: u32,

    /// How long a claim keeps other workers away.
    pub lock_duration: Duration,

    /// Pause after an iteration that claimed nothing.
    pub idle_delay: Duration,

    /// Pause after an iteration that failed.
    pub error_delay: Duration,

    /// Upper bound on a single send. Keep it below `lock_duration`; a send
    /// only starts while `now + send_timeout` is still inside the lock.
    pub send_timeout: Duration,

    /// Retry delay policy for failed sends.
    pub backoff: BackoffPolicy,
}

impl Default for OutboxPublisherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            lock_duration: Duration::from_secs(30),
            idle_delay: Duration::from_millis(300),
            error_delay: Duration::from_secs(2),
            send_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl OutboxPublisherConfig {
    /// Create config with custom batch size.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Create config with custom lock duration.
    pub fn with_lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = duration;
        self
    }

    /// Create config with custom idle delay.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Create config with custom error delay.
    pub fn with_error_delay(mut self, delay: Duration) -> Self {
        self.error_delay = delay;
        self
    }

    /// Create config with custom send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Create config with custom backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
    /// Claimed but left unsent because the lock was about to lapse.
    pub deferred: usize,
    /// Sent, but the outcome was discarded because the claim was lost.
    pub lost: usize,
}

impl BatchReport {
    /// True when the claim came back empty.
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

/// Background service that publishes one message type from the outbox.
///
/// Any number of instances may run against the same store; the claim keeps
/// them from sending the same row concurrently.
pub struct OutboxPublisher<M: OutboxEvent> {
    store: Arc<dyn OutboxStore>,
    producer: Arc<dyn MessageProducer<M>>,
    worker_id: WorkerId,
    config: OutboxPublisherConfig,
}

impl<M: OutboxEvent> OutboxPublisher<M> {
    /// Create a new OutboxPublisher with default configuration and a
    /// generated worker id.
    pub fn new(store: Arc<dyn OutboxStore>, producer: Arc<dyn MessageProducer<M>>) -> Self {
        Self::with_config(store, producer, OutboxPublisherConfig::default())
    }

    /// Create a new OutboxPublisher with custom configuration.
    pub fn with_config(
        store: Arc<dyn OutboxStore>,
        producer: Arc<dyn MessageProducer<M>>,
        config: OutboxPublisherConfig,
    ) -> Self {
        Self {
            store,
            producer,
            worker_id: WorkerId::generate(),
            config,
        }
    }

    /// Override the generated worker id.
    pub fn with_worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn config(&self) -> &OutboxPublisherConfig {
        &self.config
    }

    /// Run the publisher loop until shutdown signal is received.
    ///
    /// Iteration failures are logged and retried after `error_delay`; they
    /// never end the loop. Dropping the sender counts as a shutdown signal.
    ///
    /// Returns `Ok(())` on graceful shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        info!(
            worker_id = %self.worker_id,
            message_type = M::MESSAGE_TYPE,
            batch_size = self.config.batch_size,
            "Outbox publisher started"
        );

        loop {
            if shutdown_requested(&shutdown) {
                break;
            }

            let pause = match self.publish_once().await {
                Ok(report) if report.is_empty() => Some(self.config.idle_delay),
                Ok(report) => {
                    debug!(
                        claimed = report.claimed,
                        published = report.published,
                        failed = report.failed,
                        deferred = report.deferred,
                        lost = report.lost,
                        "Outbox batch processed"
                    );
                    None
                }
                Err(e) => {
                    error!(
                        worker_id = %self.worker_id,
                        error = %e,
                        "Outbox publisher iteration failed"
                    );
                    Some(self.config.error_delay)
                }
            };

            if let Some(pause) = pause {
                if sleep_or_shutdown(&mut shutdown, pause).await {
                    break;
                }
            }
        }

        info!(worker_id = %self.worker_id, "Outbox publisher stopped");
        Ok(())
    }

    /// Run exactly one claim / send / persist cycle.
    ///
    /// Send failures are captured on the rows and counted in the report.
    /// Only claim and persist failures surface as `Err`; in the latter case
    /// the claimed rows keep their lock and become eligible again when it
    /// lapses.
    pub async fn publish_once(&self) -> Result<BatchReport, DomainError> {
        let now = Timestamp::now();
        let lock_until = now.plus(self.config.lock_duration);
        let mut batch = self
            .store
            .claim_batch(ClaimRequest {
                message_type: M::MESSAGE_TYPE,
                now,
                batch_size: self.config.batch_size,
                lock_until,
                worker_id: &self.worker_id,
            })
            .await?;

        if batch.is_empty() {
            return Ok(BatchReport::default());
        }

        let mut report = BatchReport {
            claimed: batch.len(),
            ..BatchReport::default()
        };

        let mut attempted = 0;
        for message in batch.iter_mut() {
            if !self.send_fits_before(&lock_until) {
                break;
            }
            attempted += 1;

            match self.send(message).await {
                Ok(()) => {
                    message.mark_published(Timestamp::now());
                    report.published += 1;
                }
                Err(e) => {
                    let detail = e.to_string();
                    message.record_failure(Timestamp::now(), &detail, &self.config.backoff);
                    report.failed += 1;
                    warn!(
                        message_id = %message.id,
                        attempt = message.attempt_count,
                        retry_at = ?message.locked_until,
                        error = %detail,
                        "Failed to publish outbox message"
                    );
                }
            }
        }

        report.deferred = batch.len() - attempted;
        if report.deferred > 0 {
            warn!(
                worker_id = %self.worker_id,
                deferred = report.deferred,
                "Claim lock too close to expiry; leaving rest of batch unsent"
            );
        }
        batch.truncate(attempted);

        let lost = self.store.persist_outcomes(&self.worker_id, &batch).await?;
        for id in &lost {
            warn!(
                worker_id = %self.worker_id,
                message_id = %id,
                "Claim lost before outcome write; outcome discarded"
            );
        }
        report.lost = lost.len();

        Ok(report)
    }

    /// True while a send started now would still end inside the lock.
    fn send_fits_before(&self, lock_until: &Timestamp) -> bool {
        Timestamp::now().plus(self.config.send_timeout).is_before(lock_until)
    }

    async fn send(&self, message: &OutboxMessage) -> Result<(), DomainError> {
        let event: M = message.decode()?;

        match time::timeout(
            self.config.send_timeout,
            self.producer.produce(&message.topic_key, &message.key, &event),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::new(
                ErrorCode::PublishTimeout,
                format!("Send timed out after {:?}", self.config.send_timeout),
            )),
        }
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleeps for `pause` unless shutdown arrives first. Returns true on shutdown.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, pause: Duration) -> bool {
    tokio::select! {
        _ = time::sleep(pause) => shutdown_requested(shutdown),
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            Err(_) => true,
        },
    }
}
