//! Background drain worker.
//!
//! The worker runs as its own tokio task and touches the rest of the system
//! only through the rate limiter's queue and tracker. A scheduler task sends
//! [`DrainMessage::Drain`] on a fixed interval; callers can also trigger a
//! drain or shut the worker down through a [`DrainHandle`].

use crate::{DrainReport, RateLimiter, WorkerSettings};
use minutes_interface::ReplayHandler;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

/// Messages understood by the drain worker.
#[derive(Debug)]
pub enum DrainMessage {
    /// Run one drain cycle
    Drain,
    /// Stop the worker
    Shutdown,
}

/// Sender side of a running worker.
#[derive(Debug, Clone)]
pub struct DrainHandle {
    tx: mpsc::Sender<DrainMessage>,
}

impl DrainHandle {
    /// Ask for a drain cycle now. Returns false if the worker has stopped.
    pub async fn drain_now(&self) -> bool {
        self.tx.send(DrainMessage::Drain).await.is_ok()
    }

    /// Ask the worker to stop after the current cycle.
    pub async fn shutdown(&self) {
        if self.tx.send(DrainMessage::Shutdown).await.is_err() {
            debug!("Drain worker already stopped");
        }
    }
}

/// Periodically replays queued requests.
pub struct DrainWorker {
    limiter: RateLimiter,
    handler: Arc<dyn ReplayHandler>,
    settings: WorkerSettings,
    rx: mpsc::Receiver<DrainMessage>,
}

impl DrainWorker {
    /// Create a worker and the handle that controls it.
    pub fn new(
        limiter: RateLimiter,
        handler: Arc<dyn ReplayHandler>,
        settings: WorkerSettings,
    ) -> (Self, DrainHandle) {
        let (tx, rx) = mpsc::channel(32);
        (
            Self {
                limiter,
                handler,
                settings,
                rx,
            },
            DrainHandle { tx },
        )
    }

    /// Spawn the worker and its interval scheduler.
    ///
    /// The scheduler stops on its own once the worker has shut down.
    pub fn spawn(self, handle: &DrainHandle) -> JoinHandle<()> {
        Self::spawn_scheduler(self.settings.interval(), handle.tx.clone());
        tokio::spawn(self.run())
    }

    fn spawn_scheduler(period: std::time::Duration, tx: mpsc::Sender<DrainMessage>) {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(DrainMessage::Drain).await.is_err() {
                    debug!("Drain worker channel closed");
                    break;
                }
            }
        });
    }

    /// Process messages until shutdown or until every handle is dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!(
            interval_secs = self.settings.interval_secs,
            batch_size = self.settings.batch_size,
            "Drain worker started"
        );

        while let Some(msg) = self.rx.recv().await {
            match msg {
                DrainMessage::Drain => {
                    if let Err(e) = self.drain_cycle().await {
                        error!(error = %e, "Drain cycle failed");
                    }
                }
                DrainMessage::Shutdown => {
                    info!("Drain worker shutting down");
                    break;
                }
            }
        }
    }

    /// Replay up to `batch_size` requests, one at a time, pausing between them.
    #[instrument(skip(self))]
    pub async fn drain_cycle(&self) -> Result<DrainReport, minutes_error::RateLimitError> {
        let mut total = DrainReport::default();
        let pause = self.settings.inter_request_delay();

        for _ in 0..self.settings.batch_size {
            let report = self.limiter.process_queue(1, self.handler.as_ref()).await?;
            total.processed += report.processed;
            total.succeeded += report.succeeded;
            total.failed += report.failed;
            total.requeued += report.requeued;
            total.remaining = report.remaining;
            if report.processed == 0 {
                break;
            }
            if !pause.is_zero() {
                sleep(pause).await;
            }
        }

        if total.processed > 0 {
            info!(
                processed = total.processed,
                succeeded = total.succeeded,
                failed = total.failed,
                remaining = total.remaining,
                "Drain cycle finished"
            );
        }
        Ok(total)
    }
}
