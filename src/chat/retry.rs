// Retry sweep for messages that failed or never resolved
// Runs one resubmission at a time; triggered on connectivity recovery or by hand

use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{ChatError, ChatStore};
use crate::models::OutgoingMessage;

/// Outcome counts of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub confirmed: usize,
    pub failed: usize,
}

/// Marks a sweep as running until dropped
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(SweepGuard(flag))
        }
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ChatStore {
    /// Resubmit every own message still `Sending` or `Failed`, sequentially,
    /// reusing each message's temporary id so the confirmation reconciles in place.
    ///
    /// A failure is recorded for that message only and the sweep moves on.
    /// A sweep requested while another is running returns an empty summary and
    /// makes the running sweep take one more pass before it finishes.
    pub async fn retry_unsent_messages(&self) -> Result<RetrySummary, ChatError> {
        let (me, _peer) = self.require_conversation()?;

        let mut summary = RetrySummary::default();
        loop {
            // Request first, then claim: a finishing sweep either sees the
            // request or has already released the guard
            self.sweep_requested.store(true, Ordering::SeqCst);
            let sweep = match SweepGuard::acquire(&self.sweeping) {
                Some(guard) => guard,
                None => {
                    debug!("Retry sweep already running, queued another pass");
                    return Ok(summary);
                }
            };

            while self.sweep_requested.swap(false, Ordering::SeqCst) {
                self.retry_pass(&me.id, &mut summary).await;
            }

            drop(sweep);
            if !self.sweep_requested.load(Ordering::SeqCst) {
                break;
            }
        }

        if summary.attempted > 0 {
            info!(
                "Retry sweep done: {} confirmed, {} failed",
                summary.confirmed, summary.failed
            );
        }
        Ok(summary)
    }

    async fn retry_pass(&self, sender_id: &str, summary: &mut RetrySummary) {
        let unsent = self.state.read(|s| s.unsent_messages(sender_id));
        if unsent.is_empty() {
            return;
        }
        info!("Retrying {} unsent messages", unsent.len());

        for queued in unsent {
            let temp_id = match queued.id.temp_id() {
                Some(temp_id) => temp_id.clone(),
                None => continue,
            };

            // Re-check against current state: the original request may have been
            // confirmed, or a history replace may have dropped the entry
            let mut current = None;
            self.state.update_if(|s| {
                let changed = s.mark_sending(&temp_id);
                current = s.find_by_temp_id(&temp_id).filter(|m| m.is_unsent()).cloned();
                changed
            });
            let message = match current {
                Some(message) => message,
                None => {
                    debug!("Message {} no longer unsent, skipping retry", temp_id);
                    continue;
                }
            };

            summary.attempted += 1;
            let outgoing = OutgoingMessage::from_message(&message, temp_id.clone());
            match self.submit(&message.receiver_id, &outgoing).await {
                Ok(_) => summary.confirmed += 1,
                Err(e) => {
                    error!("Retry failed for message {}: {}", temp_id, e);
                    summary.failed += 1;
                }
            }
        }
    }

    /// Run a retry sweep every time `online` goes from `false` to `true`.
    /// The task ends when the sender side of `online` is dropped.
    pub fn spawn_connectivity_watcher(&self, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    info!("Connectivity restored, retrying unsent messages");
                    if let Err(e) = store.retry_unsent_messages().await {
                        debug!("Skipped retry sweep: {}", e);
                    }
                }
                was_online = now_online;
            }
            debug!("Connectivity watcher stopped");
        })
    }
}
