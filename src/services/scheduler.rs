//! Periodic background tasks with cooperative shutdown.

use crate::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Process-wide shutdown flag. Cloning shares the flag.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `trigger` has been called.
    pub async fn triggered(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Handle to a spawned [`PeriodicTask`].
pub struct PeriodicHandle {
    name: &'static str,
    skipped: Arc<AtomicU64>,
    runs: Arc<AtomicU64>,
    join: JoinHandle<()>,
}

impl PeriodicHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ticks dropped because the previous run was still going.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Runs started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Wait for the task loop and any in-flight run to finish.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            error!("{} task ended abnormally: {}", self.name, e);
        }
    }
}

/// A job run on a fixed interval, never overlapping with itself.
///
/// A tick that arrives while the previous run is still in flight is skipped and counted.
/// After shutdown no new runs start; the loop waits for the in-flight run before exiting.
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    pub fn spawn<F, Fut>(self, shutdown: Shutdown, job: F) -> PeriodicHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let skipped = Arc::new(AtomicU64::new(0));
        let runs = Arc::new(AtomicU64::new(0));
        let name = self.name;

        let join = tokio::spawn(run_loop(
            name,
            self.period,
            shutdown,
            job,
            skipped.clone(),
            runs.clone(),
        ));

        PeriodicHandle {
            name,
            skipped,
            runs,
            join,
        }
    }
}

async fn run_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: Shutdown,
    job: F,
    skipped: Arc<AtomicU64>,
    runs: Arc<AtomicU64>,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    info!("{} task started, every {:?}", name, period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = shutdown.triggered() => {
                info!("{} task received shutdown signal", name);
                break;
            }
            _ = ticker.tick() => {
                if in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
                    let total = skipped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!("{} still running, skipping tick ({} skipped)", name, total);
                    continue;
                }

                runs.fetch_add(1, Ordering::Relaxed);
                let run = job();
                in_flight = Some(tokio::spawn(async move {
                    match run.await {
                        Ok(()) => debug!("{} run finished", name),
                        Err(e) => error!("{} run failed: {}", name, e),
                    }
                }));
            }
        }
    }

    if let Some(handle) = in_flight {
        if !handle.is_finished() {
            info!("Waiting for in-flight {} run", name);
        }
        if let Err(e) = handle.await {
            error!("{} run panicked: {}", name, e);
        }
    }
    info!("{} task stopped", name);
}
