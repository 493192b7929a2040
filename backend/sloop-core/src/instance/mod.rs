//! One supervised backend session and the factory that builds it.

mod factory;
mod handle;
mod params;

pub use factory::SloopInstanceFactory;
pub use handle::SloopInstance;
pub use params::{build_initialize_params, host_feature_flags};

use crate::error::instance::InstanceError;

use std::future::Future;

/// A backend session as seen by the supervisor.
pub trait Instance: Send + Sync + 'static {
    /// Start the backend and perform the handshake. Runs at most once per instance.
    fn initialize(&self) -> impl Future<Output = Result<(), InstanceError>> + Send;

    /// Resolves once the session is over, whether it crashed or was disposed.
    fn wait_for_shutdown(&self) -> impl Future<Output = ()> + Send;

    /// Best-effort shutdown followed by unconditional teardown. Idempotent.
    fn dispose(&self) -> impl Future<Output = ()> + Send;
}

pub trait InstanceFactory: Send + Sync + 'static {
    type Instance: Instance;

    fn create_instance(&self) -> Result<Self::Instance, InstanceError>;
}
