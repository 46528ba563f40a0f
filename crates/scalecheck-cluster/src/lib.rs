//! scalecheck-cluster — control-plane boundary and resource lifecycle.
//!
//! The `ControlPlane` trait is the narrow interface the harness needs
//! from a cluster: apply a manifest, delete a named resource, read a
//! workload's replica count. `Kubectl` implements it by shelling out;
//! the sim crate implements it in-process.
//!
//! `LifecycleManager` layers creation-order and teardown guarantees on
//! top: resources are created in dependency order, every created
//! record is retained, and teardown is best-effort and exhaustive.

pub mod client;
pub mod error;
pub mod lifecycle;

pub use client::{ControlPlane, Kubectl};
pub use error::{ClusterError, ClusterResult};
pub use lifecycle::{LifecycleManager, ResourceSpec};
