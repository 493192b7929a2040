//! Domain models for sloop.
//!
//! This crate contains pure data structures describing what the host hands to
//! the backend process: the handshake payload and the values it is assembled
//! from. Models have no business logic - they're just data that can be passed
//! between layers and serialized onto the wire.
//!
//! ## Architecture
//!
//! - **models** (this crate): Pure data structures
//! - **sloop-core**: Supervision, transport and service registry operating on models
//! - **sloop**: Host binary wiring everything together

pub mod binding;
pub mod connection;
pub mod error;
pub mod initialize_params;
pub mod language;

pub use binding::{BindingConfiguration, BoundProject, ConfigurationScopeDto, ScopeBindingDto};
pub use common::ErrorLocation;
pub use connection::{
    SonarCloudConnectionConfig, SonarCloudRegion, SonarQubeConnectionConfig, ServerConnection,
};
pub use error::model_error::ModelError;
pub use initialize_params::builder::InitializeParamsBuilder;
pub use initialize_params::{
    ClientConstantInfo, FeatureFlags, InitializeParams, LanguageSpecificRequirements,
    StandaloneRuleConfig, TelemetryConstantAttributes, TelemetryMigration,
};
pub use language::Language;

#[cfg(test)]
mod tests;
