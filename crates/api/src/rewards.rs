//! Review rewards.
//!
//! Accepted reviews enqueue a job here; a background worker issues the
//! discount code and emails it. The submission never waits on the worker,
//! and nothing the worker does can undo an accepted review.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::services::{DiscountIssuer, EmailMessage, EmailSender, shop_display_name};

pub const QUEUE_CAPACITY: usize = 1024;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF: Duration = Duration::from_millis(500);

/// A reward owed to a customer for an auto-approved review.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardJob {
    pub shop: String,
    pub customer_email: String,
    pub customer_name: String,
    pub percentage: i32,
}

/// Sending half of the reward queue.
#[derive(Clone)]
pub struct RewardQueue {
    tx: mpsc::Sender<RewardJob>,
}

impl RewardQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RewardJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. A full or closed queue drops the job.
    pub fn enqueue(&self, job: RewardJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::error!(shop = %job.shop, "reward queue full, dropping reward");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::error!(shop = %job.shop, "reward queue closed, dropping reward");
                false
            }
        }
    }
}

/// Consumes reward jobs: issue a code, then email it.
pub struct RewardWorker {
    issuer: Arc<dyn DiscountIssuer>,
    email: Arc<dyn EmailSender>,
    max_attempts: u32,
    backoff: Duration,
}

impl RewardWorker {
    pub fn new(issuer: Arc<dyn DiscountIssuer>, email: Arc<dyn EmailSender>) -> Self {
        Self {
            issuer,
            email,
            max_attempts: MAX_ATTEMPTS,
            backoff: BACKOFF,
        }
    }

    /// Process jobs until every queue handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<RewardJob>) {
        while let Some(job) = rx.recv().await {
            self.process(job).await;
        }
        tracing::info!("reward worker stopped");
    }

    /// Returns whether the reward email went out.
    pub async fn process(&self, job: RewardJob) -> bool {
        let Some(code) = self.issue_with_retry(&job).await else {
            return false;
        };

        let message = EmailMessage::DiscountReward {
            customer_name: job.customer_name.clone(),
            shop_name: shop_display_name(&job.shop).to_string(),
            code,
            percentage: job.percentage,
        };

        match self.email.send(&job.customer_email, &message).await {
            Ok(()) => {
                tracing::info!(shop = %job.shop, "review reward sent");
                true
            }
            Err(e) => {
                tracing::error!(shop = %job.shop, error = %e, "failed to email review reward");
                false
            }
        }
    }

    async fn issue_with_retry(&self, job: &RewardJob) -> Option<String> {
        for attempt in 1..=self.max_attempts {
            match self
                .issuer
                .issue(&job.shop, job.percentage, &job.customer_name)
                .await
            {
                Ok(code) => return Some(code),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(shop = %job.shop, attempt, error = %e, "discount issue failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(shop = %job.shop, attempt, error = %e, "discount issue failed, giving up");
                }
            }
        }
        None
    }
}
