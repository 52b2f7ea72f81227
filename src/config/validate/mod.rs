//! Configuration validation
//!
//! Validates pipeline documents for consistency before any stage runs.

mod error;
mod validator;

#[cfg(test)]
mod proptests;

pub use error::ValidationError;
pub use validator::{validate_config, validate_training_args};
