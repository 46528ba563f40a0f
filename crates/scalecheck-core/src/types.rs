//! Domain types for a validation scenario.
//!
//! A scenario owns a namespace and every named resource created inside
//! it. All names derive from the scenario name with fixed suffixes so
//! that a run is reproducible and two scenarios with different names
//! can never collide.

use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::error::{ConfigError, ConfigResult};

/// One end-to-end validation run and the names of everything it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Base name, e.g. "test-azure-service-bus-topic".
    name: String,
}

impl Scenario {
    /// Create a scenario from its base name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// The scenario's base name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace owning every cluster resource of this run.
    pub fn namespace(&self) -> String {
        format!("{}-ns", self.name)
    }

    /// Secret carrying the queue connection credential.
    pub fn secret(&self) -> String {
        format!("{}-secret", self.name)
    }

    /// The workload whose replica count is under observation.
    pub fn workload(&self) -> String {
        format!("{}-deployment", self.name)
    }

    /// TriggerAuthentication binding the scaler to the secret.
    pub fn trigger_auth(&self) -> String {
        format!("{}-trigger-auth", self.name)
    }

    /// ScaledObject binding the workload to the queue trigger.
    pub fn scaled_object(&self) -> String {
        format!("{}-scaled-object", self.name)
    }

    /// Topic that load is published to.
    pub fn topic(&self) -> String {
        format!("{}-topic", self.name)
    }

    /// Subscription the scaler watches and the drain loop consumes.
    pub fn subscription(&self) -> String {
        format!("{}-subscription", self.name)
    }
}

/// Kind of a declarative resource the harness creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    Secret,
    Deployment,
    TriggerAuthentication,
    ScaledObject,
}

impl ResourceKind {
    /// Resource type name as understood by the control-plane client.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::Secret => "secret",
            ResourceKind::Deployment => "deployment",
            ResourceKind::TriggerAuthentication => "triggerauthentication",
            ResourceKind::ScaledObject => "scaledobject",
        }
    }

    /// Whether this kind lives inside a namespace.
    pub fn namespaced(&self) -> bool {
        !matches!(self, ResourceKind::Namespace)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (kind, name, namespace) triple for a created resource.
///
/// Every record handed out during setup must appear in the teardown
/// set — teardown is exhaustive even when setup aborts early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub name: String,
    /// None for cluster-scoped resources (the namespace itself).
    pub namespace: Option<String>,
}

impl ResourceRecord {
    pub fn cluster_scoped(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: None,
        }
    }

    pub fn namespaced(kind: ResourceKind, name: &str, namespace: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }
}

impl std::fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} (ns {})", self.kind, self.name, ns),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Binding between the workload's scaling policy and the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTriggerConfig {
    /// Topic the trigger watches.
    pub topic: String,
    /// Subscription whose depth is the scaling signal.
    pub subscription: String,
    /// Name of the TriggerAuthentication to reference.
    pub auth_ref: String,
    /// Scaler polling interval in seconds.
    pub polling_interval_secs: u32,
    /// Cooldown before scaling back down, in seconds.
    pub cooldown_period_secs: u32,
    /// Lower replica bound; 0 exercises scale-to-zero.
    pub min_replicas: u32,
    /// Upper replica bound.
    pub max_replicas: u32,
}

impl QueueTriggerConfig {
    /// Trigger config for a scenario with scale-to-zero bounds 0..=1.
    pub fn for_scenario(scenario: &Scenario) -> Self {
        Self {
            topic: scenario.topic(),
            subscription: scenario.subscription(),
            auth_ref: scenario.trigger_auth(),
            polling_interval_secs: 5,
            cooldown_period_secs: 10,
            min_replicas: 0,
            max_replicas: 1,
        }
    }

    /// Trigger config with bounds and cadence taken from the harness
    /// configuration.
    pub fn from_harness(config: &HarnessConfig, scenario: &Scenario) -> Self {
        Self {
            topic: scenario.topic(),
            subscription: scenario.subscription(),
            auth_ref: scenario.trigger_auth(),
            polling_interval_secs: config.trigger_polling_interval_secs,
            cooldown_period_secs: config.trigger_cooldown_secs,
            min_replicas: config.min_replicas,
            max_replicas: config.max_replicas,
        }
    }

    /// Reject bounds where the minimum exceeds the maximum.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_replicas > self.max_replicas {
            return Err(ConfigError::InvalidReplicaBounds {
                min: self.min_replicas,
                max: self.max_replicas,
            });
        }
        Ok(())
    }
}
