//! scalecheck-sim — an in-process stand-in for the external world.
//!
//! Three pieces, mirroring what a live run talks to:
//!
//! - [`SimCluster`]: a control plane that stores applied manifests,
//!   enforces creation dependency order, and cascades namespace
//!   deletion.
//! - [`SimBroker`]: a topic/subscription broker with at-least-once
//!   delivery; deliveries that are never completed are redeliverable.
//! - [`SimAutoscaler`]: a background task that watches subscription
//!   depth and flips the target workload between its configured
//!   replica bounds, the way the external scaler under test would.
//!
//! None of these are the systems under test; they exist so the
//! harness itself can be exercised end to end without a cluster.

pub mod autoscaler;
pub mod broker;
pub mod cluster;

pub use autoscaler::SimAutoscaler;
pub use broker::{SimBroker, SimHandle};
pub use cluster::SimCluster;
