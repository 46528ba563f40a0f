//! Simulated control plane.
//!
//! Stores applied manifests keyed by (namespace, kind, name) and
//! enforces the dependency rules a real control plane would: a
//! namespaced resource needs its namespace, and a ScaledObject needs
//! the workload and TriggerAuthentication it references to exist
//! first. Namespace deletion cascades.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use scalecheck_cluster::{ClusterError, ClusterResult, ControlPlane};
use scalecheck_core::{ResourceKind, ResourceRecord};

#[derive(Default)]
struct State {
    namespaces: HashSet<String>,
    /// (namespace, kind, name) → manifest.
    resources: HashMap<(String, String, String), Value>,
    /// (namespace, deployment) → replica count.
    replicas: HashMap<(String, String), u32>,
}

/// In-memory control plane. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct SimCluster {
    inner: Arc<Mutex<State>>,
}

impl SimCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// All currently applied ScaledObject manifests.
    pub fn scaled_objects(&self) -> Vec<Value> {
        let state = self.inner.lock().unwrap();
        state
            .resources
            .iter()
            .filter(|((_, kind, _), _)| kind == "scaledobject")
            .map(|(_, manifest)| manifest.clone())
            .collect()
    }

    /// Set a deployment's replica count, as the scaler would.
    pub fn set_replicas(&self, namespace: &str, deployment: &str, count: u32) {
        let mut state = self.inner.lock().unwrap();
        state
            .replicas
            .insert((namespace.to_string(), deployment.to_string()), count);
    }

    /// Number of resources currently applied (namespaces excluded).
    pub fn resource_count(&self) -> usize {
        self.inner.lock().unwrap().resources.len()
    }

    pub fn namespace_exists(&self, namespace: &str) -> bool {
        self.inner.lock().unwrap().namespaces.contains(namespace)
    }
}

fn field<'v>(manifest: &'v Value, path: &[&str], name: &'static str) -> ClusterResult<&'v str> {
    let mut cur = manifest;
    for p in path {
        cur = &cur[p];
    }
    cur.as_str().ok_or(ClusterError::MalformedManifest(name))
}

impl ControlPlane for SimCluster {
    async fn apply(&self, manifest: &Value) -> ClusterResult<()> {
        let kind = field(manifest, &["kind"], "kind")?.to_lowercase();
        let name = field(manifest, &["metadata", "name"], "metadata.name")?.to_string();

        let mut state = self.inner.lock().unwrap();

        if kind == "namespace" {
            debug!(namespace = %name, "sim: namespace created");
            state.namespaces.insert(name);
            return Ok(());
        }

        let namespace =
            field(manifest, &["metadata", "namespace"], "metadata.namespace")?.to_string();
        if !state.namespaces.contains(&namespace) {
            return Err(ClusterError::MissingDependency(format!(
                "namespace {namespace}"
            )));
        }

        match kind.as_str() {
            "deployment" => {
                let replicas = manifest["spec"]["replicas"].as_u64().unwrap_or(0) as u32;
                state
                    .replicas
                    .insert((namespace.clone(), name.clone()), replicas);
            }
            "scaledobject" => {
                // The policy references the workload and the auth
                // binding by name; both must already exist.
                let target = field(
                    manifest,
                    &["spec", "scaleTargetRef", "name"],
                    "spec.scaleTargetRef.name",
                )?;
                if !state.resources.contains_key(&(
                    namespace.clone(),
                    "deployment".to_string(),
                    target.to_string(),
                )) {
                    return Err(ClusterError::MissingDependency(format!(
                        "deployment {target}"
                    )));
                }

                let auth = manifest["spec"]["triggers"][0]["authenticationRef"]["name"]
                    .as_str()
                    .ok_or(ClusterError::MalformedManifest(
                        "spec.triggers[0].authenticationRef.name",
                    ))?
                    .to_string();
                if !state.resources.contains_key(&(
                    namespace.clone(),
                    "triggerauthentication".to_string(),
                    auth.clone(),
                )) {
                    return Err(ClusterError::MissingDependency(format!(
                        "triggerauthentication {auth}"
                    )));
                }
            }
            _ => {}
        }

        debug!(%kind, %name, %namespace, "sim: resource applied");
        state
            .resources
            .insert((namespace, kind, name), manifest.clone());
        Ok(())
    }

    async fn delete(&self, record: &ResourceRecord) -> ClusterResult<()> {
        let mut state = self.inner.lock().unwrap();

        if record.kind == ResourceKind::Namespace {
            state.namespaces.remove(&record.name);
            // Cascading delete of everything inside the namespace.
            state.resources.retain(|(ns, _, _), _| ns != &record.name);
            state.replicas.retain(|(ns, _), _| ns != &record.name);
            debug!(namespace = %record.name, "sim: namespace deleted");
            return Ok(());
        }

        let ns = record.namespace.clone().unwrap_or_default();
        // Deleting an absent resource is not an error.
        state
            .resources
            .remove(&(ns, record.kind.as_str().to_string(), record.name.clone()));
        debug!(resource = %record, "sim: resource deleted");
        Ok(())
    }

    async fn replica_count(&self, workload: &str, namespace: &str) -> ClusterResult<u32> {
        let state = self.inner.lock().unwrap();
        state
            .replicas
            .get(&(namespace.to_string(), workload.to_string()))
            .copied()
            .ok_or_else(|| ClusterError::ReplicaCount {
                workload: workload.to_string(),
                reason: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalecheck_core::{QueueTriggerConfig, Scenario, manifest};

    fn scenario() -> Scenario {
        Scenario::new("run")
    }

    async fn apply_through_auth(cluster: &SimCluster) {
        let s = scenario();
        cluster.apply(&manifest::namespace(&s)).await.unwrap();
        cluster.apply(&manifest::secret(&s, "conn")).await.unwrap();
        cluster.apply(&manifest::deployment(&s, "img")).await.unwrap();
        cluster.apply(&manifest::trigger_authentication(&s)).await.unwrap();
    }

    #[tokio::test]
    async fn namespaced_resource_requires_namespace() {
        let cluster = SimCluster::new();
        let err = cluster
            .apply(&manifest::secret(&scenario(), "conn"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::MissingDependency(_)));
    }

    #[tokio::test]
    async fn scaled_object_requires_workload_and_auth() {
        let s = scenario();
        let cluster = SimCluster::new();
        let so = manifest::scaled_object(&s, &QueueTriggerConfig::for_scenario(&s));

        cluster.apply(&manifest::namespace(&s)).await.unwrap();
        // Neither deployment nor auth exists yet.
        assert!(matches!(
            cluster.apply(&so).await.unwrap_err(),
            ClusterError::MissingDependency(_),
        ));

        cluster.apply(&manifest::deployment(&s, "img")).await.unwrap();
        // Auth still missing.
        assert!(matches!(
            cluster.apply(&so).await.unwrap_err(),
            ClusterError::MissingDependency(_),
        ));

        cluster.apply(&manifest::trigger_authentication(&s)).await.unwrap();
        cluster.apply(&so).await.unwrap();
    }

    #[tokio::test]
    async fn deployment_applies_with_declared_replicas() {
        let cluster = SimCluster::new();
        apply_through_auth(&cluster).await;
        let s = scenario();
        let count = cluster
            .replica_count(&s.workload(), &s.namespace())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn namespace_delete_cascades() {
        let cluster = SimCluster::new();
        apply_through_auth(&cluster).await;
        assert!(cluster.resource_count() > 0);

        let s = scenario();
        let ns = ResourceRecord::cluster_scoped(ResourceKind::Namespace, &s.namespace());
        cluster.delete(&ns).await.unwrap();

        assert_eq!(cluster.resource_count(), 0);
        assert!(!cluster.namespace_exists(&s.namespace()));
    }

    #[tokio::test]
    async fn delete_of_absent_resource_succeeds() {
        let cluster = SimCluster::new();
        let record = ResourceRecord::namespaced(ResourceKind::Secret, "ghost", "nowhere");
        cluster.delete(&record).await.unwrap();
    }
}
