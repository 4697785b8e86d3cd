//! Entity bookkeeping for Plumb.
//!
//! This crate provides the generic, thread-safe `EntityStore`, the
//! `EntityManager` facade that hands out shared entity handles with
//! get-or-create semantics, and the managed entity types (`Cluster`,
//! `Namespace`, `App`, `Organization`, `CloudCredential`).

pub mod entities;
pub mod manager;
pub mod store;

pub use entities::{App, AppState, CloudCredential, Cluster, Namespace, Organization};
pub use manager::{Entity, EntityManager, Shared};
pub use store::EntityStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_not_found() {
        let e = StoreError::NotFound {
            kind: "app",
            key: "db/mysql".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("app"));
        assert!(msg.contains("db/mysql"));
    }
}
