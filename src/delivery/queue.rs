//! Queued delivery: bounded retries on a bounded worker pool.
//!
//! A dispatcher drains the intake queue into one lane per recipient. A lane
//! delivers its messages strictly in arrival order and runs a message's
//! retries before moving on, so one user never sees prompts out of order.
//! Every attempt holds one of `workers` semaphore permits; a lane waiting out
//! its backoff releases the permit, so a failing user never blocks another.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tracing::{debug, error, warn};

use crate::error::DeliveryError;

use super::{DeliveryOutcome, MessageGateway, OutboundMessage};

/// Queue sizing and retry policy.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Concurrent delivery attempts.
    pub workers: usize,
    /// Undelivered messages before `send` waits for room.
    pub capacity: usize,
    /// Total attempts per message, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 1024,
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl QueueConfig {
    /// Backoff after the given failed attempt (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << exp)
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let spread = (self.initial_delay.as_millis() as u64 / 10).max(1);
        base + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
    }
}

/// Counters exposed for health reporting and tests.
#[derive(Debug, Default)]
struct QueueStats {
    delivered: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSnapshot {
    pub delivered: u64,
    pub retried: u64,
    pub dropped: u64,
}

struct Job {
    to: String,
    message: OutboundMessage,
    /// Backlog slot, released once the message is delivered or dropped.
    _slot: OwnedSemaphorePermit,
}

/// Shared by every lane task.
struct Lanes {
    transport: Arc<dyn MessageGateway>,
    workers: Arc<Semaphore>,
    config: QueueConfig,
    stats: Arc<QueueStats>,
}

/// Gateway that accepts messages immediately and delivers them in the
/// background through `transport`.
pub struct QueuedGateway {
    tx: mpsc::UnboundedSender<Job>,
    backlog: Arc<Semaphore>,
    stats: Arc<QueueStats>,
}

impl QueuedGateway {
    /// Start the dispatcher and return the gateway handle.
    ///
    /// The dispatcher stops once every handle is dropped; lanes finish their
    /// backlog before exiting.
    pub fn start(transport: Arc<dyn MessageGateway>, config: QueueConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());
        let lanes = Arc::new(Lanes {
            transport,
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            config: config.clone(),
            stats: Arc::clone(&stats),
        });
        tokio::spawn(dispatch(rx, lanes));
        Arc::new(Self {
            tx,
            backlog: Arc::new(Semaphore::new(config.capacity.max(1))),
            stats,
        })
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            retried: self.stats.retried.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }

    /// Messages discarded after exhausting their attempts.
    pub fn dropped_count(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageGateway for QueuedGateway {
    async fn send(
        &self,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        message.validate()?;
        let slot = Arc::clone(&self.backlog)
            .acquire_owned()
            .await
            .map_err(|_| DeliveryError::QueueClosed)?;
        self.tx
            .send(Job {
                to: to.to_string(),
                message: message.clone(),
                _slot: slot,
            })
            .map_err(|_| DeliveryError::QueueClosed)?;
        Ok(DeliveryOutcome::Queued)
    }
}

/// One recipient's lane as seen by the dispatcher.
struct Lane {
    tx: mpsc::UnboundedSender<Job>,
    /// Jobs handed to the lane and not yet finished.
    pending: Arc<AtomicU64>,
}

/// Route each job to its recipient's lane, opening a lane when none is live.
///
/// Only the dispatcher retires lanes, and only once they have finished every
/// job, so a recipient never has two lanes running at once.
async fn dispatch(mut rx: mpsc::UnboundedReceiver<Job>, lanes: Arc<Lanes>) {
    let mut open: HashMap<String, Lane> = HashMap::new();

    while let Some(job) = rx.recv().await {
        open.retain(|_, lane| lane.pending.load(Ordering::Acquire) > 0);

        let lane = open.entry(job.to.clone()).or_insert_with(|| {
            let (tx, lane_rx) = mpsc::unbounded_channel();
            let pending = Arc::new(AtomicU64::new(0));
            tokio::spawn(run_lane(lane_rx, Arc::clone(&pending), Arc::clone(&lanes)));
            Lane { tx, pending }
        });

        lane.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(job)) = lane.tx.send(job) {
            lane.pending.fetch_sub(1, Ordering::AcqRel);
            lanes.stats.dropped.fetch_add(1, Ordering::Relaxed);
            error!(to = %job.to, "Delivery lane closed; message dropped");
        }
    }

    debug!("Delivery dispatcher stopped");
}

/// Deliver one recipient's messages in order until the dispatcher drops the
/// lane.
async fn run_lane(mut rx: mpsc::UnboundedReceiver<Job>, pending: Arc<AtomicU64>, lanes: Arc<Lanes>) {
    while let Some(job) = rx.recv().await {
        deliver(&lanes, job).await;
        pending.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn deliver(lanes: &Lanes, job: Job) {
    let config = &lanes.config;
    let mut attempt = 1;

    loop {
        let Ok(permit) = lanes.workers.acquire().await else {
            lanes.stats.dropped.fetch_add(1, Ordering::Relaxed);
            error!(to = %job.to, "Worker pool closed; message dropped");
            return;
        };
        let result = lanes.transport.send(&job.to, &job.message).await;
        drop(permit);

        match result {
            Ok(_) => {
                lanes.stats.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(to = %job.to, attempt, "Queued message delivered");
                return;
            }
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                let delay = config.backoff_with_jitter(attempt);
                warn!(
                    to = %job.to,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Delivery failed, will retry"
                );
                lanes.stats.retried.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                lanes.stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!(
                    to = %job.to,
                    attempts = attempt,
                    error = %e,
                    body = %job.message.body().chars().take(80).collect::<String>(),
                    "Delivery failed permanently; message dropped"
                );
                return;
            }
        }
    }
}
