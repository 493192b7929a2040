//! Host binary support: logging, the concrete collaborators sloop-core notifies, and the
//! wiring that ties them to a supervised backend.

pub mod app;
pub mod error;
pub mod logger;
pub mod notifier;
pub mod trackers;

#[cfg(test)]
mod tests;
