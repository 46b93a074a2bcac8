//! Recurring drain of the unsent mail queue.
//!
//! Ticks fire on a fixed interval whether or not the previous drain has
//! finished; an in-progress flag makes overlapping ticks return immediately.
//! Failed messages stay unsent and are retried on every later tick with no
//! backoff and no retry limit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::db::store::MailQueue;

use super::transport::{Envelope, MailTransport};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another drain was still running.
    Skipped,
    /// The unsent query failed; nothing was touched.
    QueryFailed,
    Drained { sent: usize, failed: usize },
}

pub struct MailScheduler {
    queue: Arc<dyn MailQueue>,
    transport: Arc<dyn MailTransport>,
    default_from: String,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag on every exit path of a drain.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MailScheduler {
    pub fn new(
        queue: Arc<dyn MailQueue>,
        transport: Arc<dyn MailTransport>,
        default_from: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            transport,
            default_from: default_from.into(),
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_draining(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one drain unless another one is in progress.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("mail drain still running, skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = DrainGuard(&self.in_progress);

        let messages = match self.queue.unsent().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch unsent emails");
                return TickOutcome::QueryFailed;
            }
        };

        let mut sent = 0;
        let mut failed = 0;
        // Sequential on purpose: one relay request in flight at a time.
        for message in messages {
            let envelope = Envelope {
                from: if message.from_address.is_empty() {
                    self.default_from.clone()
                } else {
                    message.from_address.clone()
                },
                to: message.to_address.clone(),
                subject: message.subject.clone(),
                html: message.html.clone(),
            };

            if let Err(e) = self.transport.send(&envelope).await {
                tracing::error!(email_id = %message.id, to = %envelope.to, error = %e, "error sending email");
                failed += 1;
                continue;
            }

            match self.queue.mark_sent(&message.id, Utc::now()).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    // Delivered but not recorded: it will be sent again next tick.
                    tracing::error!(email_id = %message.id, error = %e, "failed to mark email sent");
                    failed += 1;
                }
            }
        }

        if sent > 0 || failed > 0 {
            tracing::info!(sent, failed, "mail drain finished");
        }
        TickOutcome::Drained { sent, failed }
    }

    /// Fire `tick` every `period` on its own task. Each tick is spawned
    /// separately, so a slow drain never delays the timer.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    scheduler.tick().await;
                });
            }
        })
    }
}
