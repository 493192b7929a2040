//! Owns at most one live backend instance and runs its create, initialize, death and cleanup path.

use crate::collaborators::{AliveConnectionTracker, ConfigScopeTracker};
use crate::error::supervisor::SupervisorError;
use crate::instance::{Instance, InstanceFactory};
use crate::thread_guard::ThreadGuard;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{error, info};
use tokio::sync::oneshot;

type Lifecycle = Shared<BoxFuture<'static, ()>>;

/// Observable supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Stopping,
    Disposed,
}

enum Slot<I> {
    Idle,
    Reserved,
    Starting(Arc<I>),
    Running(Arc<I>),
    Stopping,
}

impl<I> Slot<I> {
    fn instance(&self) -> Option<&Arc<I>> {
        match self {
            Slot::Starting(instance) | Slot::Running(instance) => Some(instance),
            Slot::Idle | Slot::Reserved | Slot::Stopping => None,
        }
    }

    fn holds(&self, instance: &Arc<I>) -> bool {
        self.instance()
            .is_some_and(|current| Arc::ptr_eq(current, instance))
    }
}

/// Seam the restart handler drives.
pub trait InstanceStarter: Send + Sync + 'static {
    /// Start one instance and resolve when it has died.
    fn start_instance(&self) -> impl Future<Output = Result<(), SupervisorError>> + Send;

    fn dispose(&self) -> impl Future<Output = ()> + Send;
}

struct Inner<F: InstanceFactory> {
    factory: F,
    scope_tracker: Arc<dyn ConfigScopeTracker>,
    connection_tracker: Arc<dyn AliveConnectionTracker>,
    thread_guard: ThreadGuard,
    slot: Mutex<Slot<F::Instance>>,
    start_number: AtomicU64,
    disposed: AtomicBool,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl<F: InstanceFactory> Inner<F> {
    fn slot(&self) -> MutexGuard<'_, Slot<F::Instance>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self) -> Result<(), SupervisorError> {
        let mut slot = self.slot();
        match *slot {
            Slot::Idle => {
                *slot = Slot::Reserved;
                Ok(())
            }
            _ => Err(SupervisorError::already_running(
                self.start_number.load(Ordering::SeqCst),
            )),
        }
    }

    fn release_reservation(&self) {
        let mut slot = self.slot();
        if matches!(*slot, Slot::Reserved) {
            *slot = Slot::Idle;
        }
    }

    /// Moves a reserved slot to `Starting` and publishes the lifecycle `dispose` waits on.
    /// `None` when `dispose` cleared the reservation first. The lifecycle resolves once the
    /// returned sender is used or dropped.
    fn occupy(&self, instance: &Arc<F::Instance>) -> Option<(oneshot::Sender<()>, Lifecycle)> {
        let mut slot = self.slot();
        if !matches!(*slot, Slot::Reserved) {
            return None;
        }
        *slot = Slot::Starting(Arc::clone(instance));

        let (done_tx, done_rx) = oneshot::channel();
        let lifecycle: Lifecycle = done_rx.map(|_| ()).boxed().shared();
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) = Some(lifecycle.clone());
        Some((done_tx, lifecycle))
    }

    fn mark_running(&self, instance: &Arc<F::Instance>) {
        let mut slot = self.slot();
        if slot.holds(instance) {
            *slot = Slot::Running(Arc::clone(instance));
        }
    }

    /// Takes ownership of `instance` for cleanup. False when someone else already owns it.
    fn claim_for_cleanup(&self, instance: &Arc<F::Instance>) -> bool {
        let mut slot = self.slot();
        if slot.holds(instance) {
            *slot = Slot::Stopping;
            true
        } else {
            false
        }
    }

    fn finish_cleanup(&self) {
        let mut slot = self.slot();
        if matches!(*slot, Slot::Stopping) {
            *slot = Slot::Idle;
        }
    }

    fn take_current(&self) -> Option<Arc<F::Instance>> {
        let mut slot = self.slot();
        let current = slot.instance().cloned();
        if current.is_some() || matches!(*slot, Slot::Reserved) {
            *slot = Slot::Idle;
        }
        current
    }

    /// Shared cleanup for a failed start, a crash and an explicit dispose.
    async fn on_instance_died(&self, start_number: u64, instance: &Arc<F::Instance>) {
        if self.claim_for_cleanup(instance) {
            instance.dispose().await;
            self.finish_cleanup();
        }
        self.scope_tracker.reset();
        info!("[sloop #{start_number}] instance died");
    }
}

pub struct InstanceSupervisor<F: InstanceFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: InstanceFactory> InstanceSupervisor<F> {
    pub fn new(
        factory: F,
        scope_tracker: Arc<dyn ConfigScopeTracker>,
        connection_tracker: Arc<dyn AliveConnectionTracker>,
        thread_guard: ThreadGuard,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                scope_tracker,
                connection_tracker,
                thread_guard,
                slot: Mutex::new(Slot::Idle),
                start_number: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    pub fn current_start_number(&self) -> u64 {
        self.inner.start_number.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SupervisorState {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return SupervisorState::Disposed;
        }
        match *self.inner.slot() {
            Slot::Idle => SupervisorState::Idle,
            Slot::Reserved | Slot::Starting(_) => SupervisorState::Starting,
            Slot::Running(_) => SupervisorState::Running,
            Slot::Stopping => SupervisorState::Stopping,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Create and initialize one instance, then wait for it to die.
    ///
    /// Creation and initialization failures are logged and end the call with `Ok(())`; only
    /// programming errors (already running, disposed, wrong thread) are returned.
    pub async fn start_instance(&self) -> Result<(), SupervisorError> {
        let inner = &self.inner;

        if inner.disposed.load(Ordering::SeqCst) {
            return Err(SupervisorError::disposed());
        }
        if inner.thread_guard.is_on_ui_thread() {
            return Err(SupervisorError::on_ui_thread());
        }
        inner.reserve()?;

        let start_number = inner.start_number.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[sloop #{start_number}] creating instance");

        let instance = match inner.factory.create_instance() {
            Ok(instance) => Arc::new(instance),
            Err(e) => {
                error!("[sloop #{start_number}] failed to create instance: {e}");
                inner.release_reservation();
                return Ok(());
            }
        };

        let Some((done_tx, lifecycle)) = inner.occupy(&instance) else {
            instance.dispose().await;
            return Err(SupervisorError::disposed());
        };

        info!("[sloop #{start_number}] starting instance");
        if let Err(e) = instance.initialize().await {
            error!("[sloop #{start_number}] failed to start instance: {e}");
            inner.on_instance_died(start_number, &instance).await;
            drop(done_tx);
            return Ok(());
        }
        inner.mark_running(&instance);

        let watcher = {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                instance.wait_for_shutdown().await;
                inner.on_instance_died(start_number, &instance).await;
                let _ = done_tx.send(());
            })
        };
        lifecycle.await;
        if let Err(e) = watcher.await {
            error!("[sloop #{start_number}] lifecycle task failed: {e}");
        }
        Ok(())
    }

    /// Dispose the running instance, wait for its cleanup, then the connection tracker and the
    /// scope tracker, in that order. Idempotent.
    pub async fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(instance) = inner.take_current() {
            instance.dispose().await;
        }

        let lifecycle = inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(lifecycle) = lifecycle {
            lifecycle.await;
        }

        inner.connection_tracker.dispose();
        inner.scope_tracker.dispose();
        info!("Supervisor disposed");
    }
}

impl<F: InstanceFactory> InstanceStarter for InstanceSupervisor<F> {
    fn start_instance(&self) -> impl Future<Output = Result<(), SupervisorError>> + Send {
        InstanceSupervisor::start_instance(self)
    }

    fn dispose(&self) -> impl Future<Output = ()> + Send {
        InstanceSupervisor::dispose(self)
    }
}
