//! Validation engine and scenario orchestration for Plumb.
//!
//! This crate ties together the entity managers, the driver registry, and the
//! cluster capabilities: the [`Validator`] polls predicates over cluster state
//! within a timeout, and the [`Harness`] runs app scenarios (deploy, validate
//! volumes and readiness, tear down, validate cleanup) on top of it. It also
//! provides cancellation, a pluggable clock, and the app lifecycle state
//! machine.

pub mod cancel;
pub mod clock;
pub mod harness;
pub mod lifecycle;
pub mod predicates;
pub mod validate;

pub use cancel::{install_signal_handler, CancelToken};
pub use clock::{Clock, ManualClock, SystemClock};
pub use harness::{Harness, ScenarioReport};
pub use lifecycle::validate_transition;
pub use validate::{
    Attempt, AttemptResult, Check, ValidationContext, ValidationOutcome, ValidationRequest,
    ValidationStatus, Validator,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] plumb_schema::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] plumb_store::StoreError),
    #[error("driver error: {0}")]
    Driver(#[from] plumb_driver::DriverError),
    #[error("provider error: {0}")]
    Provider(#[from] plumb_driver::ProviderError),
    #[error("invalid app state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("validation '{name}' {status} after {attempts} attempts: {reason}")]
    ValidationFailed {
        name: String,
        status: ValidationStatus,
        attempts: u32,
        reason: String,
    },
}
