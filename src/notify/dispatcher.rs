//! Welcome notification dispatch.
//!
//! Jobs go onto a bounded queue with `try_send` and are drained by a fixed
//! pool of worker tasks. The caller never waits on delivery; a full or
//! closed queue drops the job with a warning.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::mailer::WelcomeMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeJob {
    pub email: String,
    pub first_name: String,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<WelcomeJob>,
}

impl NotificationDispatcher {
    /// Dispatcher plus the receiving end; the caller decides who drains it
    pub fn channel(queue_size: usize) -> (Self, mpsc::Receiver<WelcomeJob>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { tx }, rx)
    }

    /// Build the queue and spawn `worker_count` workers on the current runtime
    pub fn start(
        mailer: Arc<dyn WelcomeMailer>,
        queue_size: usize,
        worker_count: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (dispatcher, rx) = Self::channel(queue_size);
        let handles = Self::spawn_workers(rx, worker_count, mailer);
        (dispatcher, handles)
    }

    pub fn spawn_workers(
        rx: mpsc::Receiver<WelcomeJob>,
        worker_count: usize,
        mailer: Arc<dyn WelcomeMailer>,
    ) -> Vec<JoinHandle<()>> {
        let shared_rx = Arc::new(Mutex::new(rx));
        let workers = worker_count.max(1);

        (0..workers)
            .map(|i| {
                let rx = shared_rx.clone();
                let mailer = mailer.clone();
                tokio::spawn(async move {
                    loop {
                        let job_opt = { rx.lock().await.recv().await };
                        let Some(job) = job_opt else {
                            break;
                        };
                        if let Err(e) = mailer.send_welcome(&job.email, &job.first_name).await {
                            warn!(worker = i, email = %job.email, error = %e, "Welcome notification failed");
                        }
                    }
                    debug!(worker = i, "Notification worker stopped");
                })
            })
            .collect()
    }

    /// Queue a welcome notification. Never blocks, never fails the caller.
    pub fn notify_welcome(&self, email: &str, first_name: &str) {
        let job = WelcomeJob {
            email: email.to_string(),
            first_name: first_name.to_string(),
        };

        match self.tx.try_send(job) {
            Ok(()) => debug!(email, "Welcome notification queued"),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(email = %job.email, "Notification queue full, dropping welcome");
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(email = %job.email, "Notification workers gone, dropping welcome");
            }
        }
    }
}
