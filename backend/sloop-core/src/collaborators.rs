//! Host-side objects the supervisor notifies but does not own.

use models::BindingConfiguration;

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// Source of the current binding, initialized once per successful handshake.
pub trait ActiveBindingTracker: Send + Sync {
    fn current_configuration(&self) -> Option<BindingConfiguration>;

    fn initialize(&self) -> BoxFuture<'_, ()>;
}

/// Receives the binding that should be active on the freshly started backend.
pub trait ConfigScopeUpdater: Send + Sync {
    fn set_current_configuration(&self, configuration: BindingConfiguration) -> BoxFuture<'_, ()>;
}

pub trait ConfigScopeTracker: Send + Sync {
    /// Forget every scope declared to the backend that just died.
    fn reset(&self);

    fn dispose(&self);
}

pub trait AliveConnectionTracker: Send + Sync {
    fn dispose(&self);
}

/// Zero-argument callback that resumes automatic restarts.
#[derive(Clone)]
pub struct ResetAction(Arc<dyn Fn() + Send + Sync>);

impl ResetAction {
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(action))
    }

    pub fn invoke(&self) {
        (self.0)()
    }
}

impl Debug for ResetAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("ResetAction")
    }
}

/// Surfaces the manual-retry gate once the automatic restart budget is spent.
pub trait RestartNotifier: Send + Sync {
    fn show(&self, reset: ResetAction);
}
