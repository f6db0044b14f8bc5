// src/shutdown.rs - Cooperative stop signalling for long-lived scopes

use tokio::sync::watch;

/// Owner side of a stop signal. Cloneable handles observe the trigger;
/// triggering twice is a no-op.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Observer side handed to spawned scopes and task submitters.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the signal. All current and future observers see it.
    pub fn trigger(&self) {
        // send_replace never fails even with no receivers
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

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal is triggered; immediately if it already was.
    pub async fn triggered(&mut self) {
        // wait_for only errs when the sender is dropped, which also means stop
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
