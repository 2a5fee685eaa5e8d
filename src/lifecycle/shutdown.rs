//! Cooperative stop flag.
//!
//! The process owns a [`Shutdown`]; the session only ever holds a
//! [`StopSignal`] and reads it once per reactor iteration.

use std::sync::Arc;

use tokio::sync::watch;

/// Owner side of the stop flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Hand out a read-only view of the flag.
    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the flag. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of the stop flag.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the flag is raised. Pends forever if the owner is gone
    /// without raising it.
    pub async fn wait(&mut self) {
        let raised = self.rx.wait_for(|stop| *stop).await.is_ok();
        if !raised {
            std::future::pending::<()>().await;
        }
    }
}
