//! Resource lifecycle manager.
//!
//! Creates resources in dependency order and retains a record of
//! everything created so teardown is exhaustive. Teardown deletes
//! every individually named resource before any namespace, continues
//! past individual failures, and is a no-op when invoked again.

use tracing::{info, warn};

use scalecheck_core::{ResourceKind, ResourceRecord};

use crate::client::ControlPlane;
use crate::error::{ClusterError, ClusterResult};

/// A resource to create: its identity plus the manifest to apply.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    pub record: ResourceRecord,
    pub manifest: serde_json::Value,
}

impl ResourceSpec {
    pub fn new(record: ResourceRecord, manifest: serde_json::Value) -> Self {
        Self { record, manifest }
    }
}

/// Tracks every resource created for a scenario and releases them all.
pub struct LifecycleManager<'a, C: ControlPlane> {
    cluster: &'a C,
    created: Vec<ResourceRecord>,
}

impl<'a, C: ControlPlane> LifecycleManager<'a, C> {
    pub fn new(cluster: &'a C) -> Self {
        Self {
            cluster,
            created: Vec::new(),
        }
    }

    /// Apply one resource and record it for teardown.
    ///
    /// A failed apply is fatal to setup; the caller aborts remaining
    /// creation and runs `teardown`, which releases everything
    /// created up to this point.
    pub async fn create(&mut self, spec: ResourceSpec) -> ClusterResult<ResourceRecord> {
        info!(resource = %spec.record, "creating resource");
        self.cluster.apply(&spec.manifest).await?;
        self.created.push(spec.record.clone());
        Ok(spec.record)
    }

    /// Resources created so far, in creation order.
    pub fn created(&self) -> &[ResourceRecord] {
        &self.created
    }

    /// Best-effort release of everything created.
    ///
    /// Named resources are deleted before namespaces so nothing is
    /// orphaned by a cascading delete racing ahead. Failures are
    /// collected, never propagated mid-teardown. Draining the record
    /// set makes a second invocation a no-op.
    pub async fn teardown(&mut self) -> Vec<ClusterError> {
        let records = std::mem::take(&mut self.created);
        if records.is_empty() {
            return Vec::new();
        }

        let (namespaces, named): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.kind == ResourceKind::Namespace);

        let mut errors = Vec::new();
        // Named resources first, newest first: dependents go before
        // the objects they reference.
        for record in named.iter().rev().chain(namespaces.iter()) {
            info!(resource = %record, "deleting resource");
            if let Err(e) = self.cluster.delete(record).await {
                warn!(resource = %record, error = %e, "teardown delete failed, continuing");
                errors.push(e);
            }
        }
        errors
    }
}
