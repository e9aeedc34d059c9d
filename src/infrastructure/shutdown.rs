use std::future::Future;

use tokio::sync::watch;

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        let _ = self.receiver.changed().await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Drive `fut` to completion unless shutdown fires first, in which case
    /// `fut` is dropped and `None` returned.
    pub async fn run_until<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        if self.is_triggered() {
            return None;
        }
        tokio::select! {
            out = fut => Some(out),
            _ = self.notified() => None,
        }
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "app", "ctrl-c received");
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                tracing::info!(target: "app", "SIGTERM received");
                term.trigger();
            }
        });
    }
}
