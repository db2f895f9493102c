// Cooperative shutdown — Ctrl-C asks the running job to stop at the next
// account boundary instead of cancelling it mid-profile.
//
// The first interrupt flips a watch flag that jobs poll between accounts.
// A second interrupt exits immediately without saving.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Sending half, owned by whoever decides the run should stop.
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half, polled by the runner and the jobs.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        channel().1
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the trigger
    /// was dropped without firing.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Turn Ctrl-C into a shutdown request. A second Ctrl-C exits the process.
pub fn listen_for_ctrl_c(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for Ctrl-C");
            return;
        }
        warn!("Interrupted, finishing the current account (Ctrl-C again to quit now)");
        trigger.trigger();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Interrupted twice, exiting without saving the session");
            std::process::exit(130);
        }
    })
}
