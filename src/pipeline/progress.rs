use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};

use crate::domain::{Phase, ProgressSnapshot};

/// Destination for rendered progress text, e.g. an editable chat message.
pub trait ProgressTransport: Send + Sync {
    fn publish<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Default)]
struct Counters {
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
}

/// Shared progress state for one run.
///
/// Updates never wait on the transport: they replace the latest snapshot in a
/// watch channel and a separate reporter task decides what to send.
#[derive(Debug)]
pub struct ProgressTracker {
    counters: Mutex<(Counters, Phase)>,
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ProgressSnapshot::idle());
        Self {
            counters: Mutex::new((Counters::default(), Phase::Collecting)),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    pub fn set_phase(&self, phase: Phase) {
        let mut guard = self.counters.lock();
        guard.1 = phase;
        self.publish(&guard.0, guard.1);
    }

    /// Reset the counters for an analysis stage of `total` items.
    pub fn begin(&self, total: usize) {
        let mut guard = self.counters.lock();
        guard.0 = Counters {
            total,
            ..Counters::default()
        };
        guard.1 = Phase::Analyzing;
        self.publish(&guard.0, guard.1);
    }

    pub fn record_success(&self) {
        self.record(true);
    }

    pub fn record_failure(&self) {
        self.record(false);
    }

    fn record(&self, succeeded: bool) {
        let mut guard = self.counters.lock();
        let counters = &mut guard.0;
        if counters.completed >= counters.total {
            tracing::warn!(
                target: "progress",
                total = counters.total,
                "completion recorded past total; ignoring"
            );
            return;
        }
        counters.completed += 1;
        if succeeded {
            counters.succeeded += 1;
        } else {
            counters.failed += 1;
        }
        self.publish(&guard.0, guard.1);
    }

    // Called with the lock held so published snapshots never go backwards.
    fn publish(&self, counters: &Counters, phase: Phase) {
        self.tx.send_replace(ProgressSnapshot {
            total: counters.total,
            completed: counters.completed,
            succeeded: counters.succeeded,
            failed: counters.failed,
            phase,
            at: Utc::now(),
        });
    }
}

/// Forward snapshots to `transport`, at most one per `throttle` window.
///
/// Intermediate snapshots are coalesced. When the tracker is dropped the
/// latest snapshot is flushed if it has not been sent yet.
pub fn spawn_reporter(
    mut rx: watch::Receiver<ProgressSnapshot>,
    transport: Arc<dyn ProgressTransport>,
    throttle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_sent: Option<ProgressSnapshot> = None;

        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            send(transport.as_ref(), &snapshot).await;
            last_sent = Some(snapshot);
            tokio::time::sleep(throttle).await;
        }

        let latest = rx.borrow().clone();
        if last_sent.as_ref() != Some(&latest) && latest.total + latest.completed > 0 {
            send(transport.as_ref(), &latest).await;
        }
    })
}

async fn send(transport: &dyn ProgressTransport, snapshot: &ProgressSnapshot) {
    if let Err(err) = transport.publish(&snapshot.render()).await {
        tracing::debug!(target: "progress", error = %err, "progress update not delivered");
    }
}
