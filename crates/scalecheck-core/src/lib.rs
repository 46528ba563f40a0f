//! scalecheck-core — shared domain types for the scaling validation harness.
//!
//! A `Scenario` names one end-to-end validation run and derives every
//! resource name (namespace, secret, workload, trigger auth, scaling
//! policy, topic, subscription) deterministically from the scenario
//! name, so repeated runs are reproducible and concurrent scenarios
//! with distinct names cannot collide.
//!
//! The manifests module renders the declarative objects the scenario
//! applies to the cluster; the config module loads harness tuning from
//! an optional `scalecheck.toml` plus the queue credential from the
//! environment.

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::HarnessConfig;
pub use error::{ConfigError, ConfigResult};
pub use types::{QueueTriggerConfig, ResourceKind, ResourceRecord, Scenario};
