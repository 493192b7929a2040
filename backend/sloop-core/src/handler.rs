//! Bounded automatic restarts with a manual-retry gate.

use crate::collaborators::{ResetAction, RestartNotifier};
use crate::error::supervisor::SupervisorError;
use crate::supervisor::InstanceStarter;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

struct HandlerInner<S> {
    starter: Arc<S>,
    notifier: Arc<dyn RestartNotifier>,
    max_starts_before_manual: u32,
    restart_count: AtomicU32,
    enabled: AtomicBool,
    disposed: AtomicBool,
    reset_tx: mpsc::UnboundedSender<()>,
    reset_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    shutdown: watch::Sender<bool>,
    restart_loop: Mutex<Option<JoinHandle<()>>>,
}

impl<S> HandlerInner<S> {
    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// A callback that reopens the gate once. Later invocations are ignored.
    fn reset_action(self: &Arc<Self>) -> ResetAction
    where
        S: Send + Sync + 'static,
    {
        let inner: Weak<Self> = Arc::downgrade(self);
        let used = AtomicBool::new(false);
        ResetAction::new(move || {
            if used.swap(true, Ordering::SeqCst) {
                debug!("Ignoring reuse of a spent reset action");
                return;
            }
            if let Some(inner) = inner.upgrade() {
                inner.restart_count.store(0, Ordering::SeqCst);
                let _ = inner.reset_tx.send(());
            }
        })
    }
}

/// Top-level owner of the backend: keeps it running across crashes, up to a limit.
pub struct SloopHandler<S: InstanceStarter> {
    inner: Arc<HandlerInner<S>>,
}

impl<S: InstanceStarter> SloopHandler<S> {
    pub fn new(
        starter: Arc<S>,
        notifier: Arc<dyn RestartNotifier>,
        max_starts_before_manual: u32,
    ) -> Self {
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(HandlerInner {
                starter,
                notifier,
                max_starts_before_manual: max_starts_before_manual.max(1),
                restart_count: AtomicU32::new(0),
                enabled: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                reset_tx,
                reset_rx: Mutex::new(Some(reset_rx)),
                shutdown: watch::Sender::new(false),
                restart_loop: Mutex::new(None),
            }),
        }
    }

    pub fn restart_count(&self) -> u32 {
        self.inner.restart_count.load(Ordering::SeqCst)
    }

    pub fn max_starts_before_manual(&self) -> u32 {
        self.inner.max_starts_before_manual
    }

    /// Spawn the restart loop. Later calls are no-ops.
    pub fn enable_sloop(&self) {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) || inner.enabled.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(reset_rx) = inner
            .reset_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        info!(
            "Enabling sloop (max {} starts before manual retry)",
            inner.max_starts_before_manual
        );
        let task = tokio::spawn(run_restart_loop(Arc::clone(inner), reset_rx));
        *inner
            .restart_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Stop the loop, dispose the supervisor exactly once and wait for the loop to finish.
    pub async fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        inner.shutdown.send_replace(true);
        inner.starter.dispose().await;

        let task = inner
            .restart_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!("Restart loop ended abnormally: {e}");
        }
        info!("Sloop handler disposed");
    }
}

async fn run_restart_loop<S: InstanceStarter>(
    inner: Arc<HandlerInner<S>>,
    mut reset_rx: mpsc::UnboundedReceiver<()>,
) {
    let mut shutdown = inner.shutdown.subscribe();
    let max = inner.max_starts_before_manual;

    loop {
        while inner.restart_count.load(Ordering::SeqCst) < max {
            if inner.is_shutting_down() {
                return;
            }

            inner.restart_count.fetch_add(1, Ordering::SeqCst);
            match inner.starter.start_instance().await {
                Ok(()) => {}
                Err(SupervisorError::Disposed { .. }) => {
                    debug!("Supervisor disposed, restart loop exiting");
                    return;
                }
                Err(e) => {
                    error!("Restart loop stopped: {e}");
                    return;
                }
            }
        }

        if inner.is_shutting_down() {
            return;
        }

        warn!("Backend stopped {max} time(s) in a row, waiting for manual retry");
        while reset_rx.try_recv().is_ok() {}
        inner.notifier.show(inner.reset_action());

        tokio::select! {
            received = reset_rx.recv() => {
                if received.is_none() {
                    return;
                }
            }
            _ = stopped(&mut shutdown) => return,
        }

        info!("Manual retry requested, restarting backend");
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}
