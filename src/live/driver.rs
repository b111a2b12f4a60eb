//! Background refresh driver
//!
//! Owns a [`SnapshotSource`] (normally the [`UsageEngine`]) and queries it on a fixed interval or whenever the selected
//! window changes. Each build runs on tokio's blocking pool; finished snapshots are
//! posted into a `watch` channel that the render loop reads without waiting.
//!
//! Builds never overlap: the loop awaits each build before looking at the clock again,
//! and ticks missed meanwhile are skipped rather than queued. A result whose window no
//! longer matches the current selection is dropped on arrival.

use crate::engine::UsageEngine;
use crate::error::Result;
use crate::models::Snapshot;
use crate::window::WindowSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What the driver queries on every refresh.
pub trait SnapshotSource: Send + 'static {
    fn snapshot(&mut self, window: WindowSpec) -> Result<Arc<Snapshot>>;
}

impl SnapshotSource for UsageEngine {
    fn snapshot(&mut self, window: WindowSpec) -> Result<Arc<Snapshot>> {
        self.query(window)
    }
}

/// A snapshot together with the build that produced it.
#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    /// Strictly increasing across published snapshots.
    pub seq: u64,
    pub window: WindowSpec,
    pub snapshot: Arc<Snapshot>,
}

pub struct DriverHandle {
    window_tx: watch::Sender<WindowSpec>,
    snapshot_rx: watch::Receiver<Option<PublishedSnapshot>>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Select a new window. Invalid custom ranges are rejected here and the current
    /// selection is left as it was.
    pub fn set_window(&self, window: WindowSpec) -> Result<()> {
        window.validate()?;
        self.window_tx.send_if_modified(|current| {
            if *current == window {
                false
            } else {
                *current = window;
                true
            }
        });
        Ok(())
    }

    pub fn window(&self) -> WindowSpec {
        *self.window_tx.borrow()
    }

    /// The most recent snapshot, if any build has finished yet.
    pub fn latest(&self) -> Option<PublishedSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver that is notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<PublishedSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Stop the driver, waiting for an in-flight build to finish.
    pub async fn shutdown(self) {
        let DriverHandle {
            window_tx, task, ..
        } = self;
        drop(window_tx);
        if let Err(e) = task.await {
            warn!(error = %e, "Refresh driver ended abnormally");
        }
    }
}

/// Start the driver on the current tokio runtime.
pub fn spawn_driver<S: SnapshotSource>(
    source: S,
    window: WindowSpec,
    period: Duration,
) -> Result<DriverHandle> {
    window.validate()?;

    let (window_tx, window_rx) = watch::channel(window);
    let (snapshot_tx, snapshot_rx) = watch::channel(None);
    let task = tokio::spawn(run(source, window_rx, snapshot_tx, period));

    Ok(DriverHandle {
        window_tx,
        snapshot_rx,
        task,
    })
}

async fn run<S: SnapshotSource>(
    source: S,
    mut window_rx: watch::Receiver<WindowSpec>,
    snapshot_tx: watch::Sender<Option<PublishedSnapshot>>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut source = Some(source);
    let mut seq = 0u64;
    info!(period_ms = period.as_millis() as u64, "Refresh driver started");

    loop {
        tokio::select! {
            biased;
            changed = window_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {}
        }

        let window = *window_rx.borrow_and_update();
        let Some(mut owned) = source.take() else {
            break;
        };

        let build = tokio::task::spawn_blocking(move || {
            let result = owned.snapshot(window);
            (owned, result)
        })
        .await;

        let (returned, result) = match build {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Snapshot build panicked, stopping refresh driver");
                break;
            }
        };
        source = Some(returned);

        if *window_rx.borrow() != window {
            debug!(window = %window, "Window changed during build, discarding snapshot");
            continue;
        }

        match result {
            Ok(snapshot) => {
                seq += 1;
                snapshot_tx.send_replace(Some(PublishedSnapshot {
                    seq,
                    window,
                    snapshot,
                }));
            }
            Err(e) => warn!(window = %window, error = %e, "Snapshot build failed, keeping previous snapshot"),
        }
    }

    info!("Refresh driver stopped");
}
