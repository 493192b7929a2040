//! Shared primitives for the sloop workspace.
//!
//! Every error enum in the workspace records where it was raised through
//! [`ErrorLocation`], so this crate sits underneath all the others.

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
