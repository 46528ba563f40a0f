//! Control-plane client boundary.
//!
//! `Kubectl` drives a real cluster through the `kubectl` binary with
//! stdin-piped JSON manifests. Non-zero exit on apply is fatal to
//! setup; deletes pass `--ignore-not-found` so repeated teardown of an
//! already-deleted resource is not an error.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use scalecheck_core::ResourceRecord;

use crate::error::{ClusterError, ClusterResult};

/// The narrow interface the harness needs from a cluster.
pub trait ControlPlane {
    /// Apply a declarative manifest. The namespace is taken from the
    /// manifest's own metadata.
    fn apply(&self, manifest: &serde_json::Value) -> impl Future<Output = ClusterResult<()>>;

    /// Delete a named resource. Deleting a resource that no longer
    /// exists succeeds.
    fn delete(&self, record: &ResourceRecord) -> impl Future<Output = ClusterResult<()>>;

    /// Observed replica count of a workload.
    fn replica_count(
        &self,
        workload: &str,
        namespace: &str,
    ) -> impl Future<Output = ClusterResult<u32>>;
}

/// `kubectl`-backed control-plane client.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
}

impl Kubectl {
    pub fn new() -> Self {
        Self {
            binary: "kubectl".to_string(),
        }
    }

    /// Use a non-default binary (e.g. a wrapper script or full path).
    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> ClusterResult<Vec<u8>> {
        debug!(binary = %self.binary, ?args, "invoking control-plane client");

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                std::io::Error::other("child stdin not captured")
            })?;
            pipe.write_all(input).await?;
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ClusterError::Apply {
                resource: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlane for Kubectl {
    async fn apply(&self, manifest: &serde_json::Value) -> ClusterResult<()> {
        let payload = serde_json::to_vec(manifest)
            .map_err(|_| ClusterError::MalformedManifest("metadata"))?;
        self.run(&apply_args(), Some(&payload)).await?;
        Ok(())
    }

    async fn delete(&self, record: &ResourceRecord) -> ClusterResult<()> {
        let args = delete_args(record);
        self.run(&args, None).await.map_err(|e| match e {
            ClusterError::Apply { resource, stderr } => ClusterError::Delete { resource, stderr },
            other => other,
        })?;
        Ok(())
    }

    async fn replica_count(&self, workload: &str, namespace: &str) -> ClusterResult<u32> {
        let out = self
            .run(&get_args(workload, namespace), None)
            .await
            .map_err(|e| ClusterError::ReplicaCount {
                workload: workload.to_string(),
                reason: e.to_string(),
            })?;

        let value: serde_json::Value =
            serde_json::from_slice(&out).map_err(|e| ClusterError::ReplicaCount {
                workload: workload.to_string(),
                reason: format!("unparseable status: {e}"),
            })?;

        // status.replicas is absent while the workload sits at zero.
        Ok(value["status"]["replicas"].as_u64().unwrap_or(0) as u32)
    }
}

fn apply_args() -> Vec<String> {
    vec!["apply".into(), "-f".into(), "-".into()]
}

fn delete_args(record: &ResourceRecord) -> Vec<String> {
    let mut args = vec![
        "delete".to_string(),
        record.kind.as_str().to_string(),
        record.name.clone(),
        "--ignore-not-found=true".to_string(),
        "--wait=false".to_string(),
    ];
    if let Some(ns) = &record.namespace {
        args.push("-n".to_string());
        args.push(ns.clone());
    }
    args
}

fn get_args(workload: &str, namespace: &str) -> Vec<String> {
    vec![
        "get".to_string(),
        "deployment".to_string(),
        workload.to_string(),
        "-n".to_string(),
        namespace.to_string(),
        "-o".to_string(),
        "json".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalecheck_core::ResourceKind;

    #[test]
    fn delete_passes_ignore_not_found() {
        let record = ResourceRecord::namespaced(ResourceKind::Secret, "run-secret", "run-ns");
        let args = delete_args(&record);
        assert_eq!(
            args,
            vec![
                "delete",
                "secret",
                "run-secret",
                "--ignore-not-found=true",
                "--wait=false",
                "-n",
                "run-ns",
            ],
        );
    }

    #[test]
    fn namespace_delete_has_no_namespace_flag() {
        let record = ResourceRecord::cluster_scoped(ResourceKind::Namespace, "run-ns");
        let args = delete_args(&record);
        assert!(!args.contains(&"-n".to_string()));
    }

    #[test]
    fn replica_lookup_targets_the_deployment_json() {
        let args = get_args("run-deployment", "run-ns");
        assert_eq!(
            args,
            vec!["get", "deployment", "run-deployment", "-n", "run-ns", "-o", "json"],
        );
    }
}
