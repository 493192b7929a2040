//! Supervision of the out-of-process sloop backend.
//!
//! A [`handler::SloopHandler`] drives an [`supervisor::InstanceSupervisor`], which starts one
//! [`instance::SloopInstance`] at a time. Each instance opens a fresh [`transport::Connection`]
//! through the [`connection_factory::RpcConnectionFactory`], performs the `initialize`
//! handshake and lives until that connection dies.

pub mod collaborators;
pub mod config;
pub mod connection_factory;
pub mod error;
pub mod handler;
pub mod instance;
pub mod listeners;
pub mod providers;
pub mod services;
pub mod supervisor;
pub mod thread_guard;
pub mod transport;

#[cfg(test)]
mod tests;

pub const SLOOP_BACKEND_BINARY: &str = "sloop-backend";
pub const SLOOP_BACKEND_PATH_ENV: &str = "SLOOP_BACKEND_PATH";
pub const SLOOP_DATA_DIR_ENV: &str = "SLOOP_DATA_DIR";
pub const SLOOP_CLIENT_NAME: &str = "sloop-host";
pub const SLOOP_CLIENT_USER_AGENT: &str =
    const_format::concatcp!(SLOOP_CLIENT_NAME, "/", env!("CARGO_PKG_VERSION"));
