//! Declarative manifest builders.
//!
//! Renders the five objects a scenario applies, as JSON value trees:
//! Namespace, Secret (base64-encoded connection credential under a
//! fixed key), Deployment (replicas 0, selector matching its own
//! template labels), TriggerAuthentication (secret reference), and
//! ScaledObject (one azure-servicebus topic trigger).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use crate::types::{QueueTriggerConfig, Scenario};

/// Key inside the secret that holds the connection credential.
pub const SECRET_CONNECTION_KEY: &str = "connection";

/// Namespace owning every other object of the scenario.
pub fn namespace(scenario: &Scenario) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": scenario.namespace() },
    })
}

/// Secret carrying the base64-encoded queue credential.
pub fn secret(scenario: &Scenario, connection_string: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": scenario.secret(),
            "namespace": scenario.namespace(),
        },
        "type": "Opaque",
        "data": {
            SECRET_CONNECTION_KEY: STANDARD.encode(connection_string),
        },
    })
}

/// Target workload, deployed with zero replicas.
///
/// The scaler owns the replica count from the moment the scaling
/// policy exists; starting at zero means the baseline assertion holds
/// without waiting for a scale-down.
pub fn deployment(scenario: &Scenario, image: &str) -> Value {
    let name = scenario.workload();
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": scenario.namespace(),
        },
        "spec": {
            "replicas": 0,
            "selector": {
                "matchLabels": { "app": name },
            },
            "template": {
                "metadata": {
                    "labels": { "app": name },
                },
                "spec": {
                    "containers": [{
                        "name": "app",
                        "image": image,
                    }],
                },
            },
        },
    })
}

/// TriggerAuthentication pointing the scaler at the secret.
pub fn trigger_authentication(scenario: &Scenario) -> Value {
    json!({
        "apiVersion": "keda.sh/v1alpha1",
        "kind": "TriggerAuthentication",
        "metadata": {
            "name": scenario.trigger_auth(),
            "namespace": scenario.namespace(),
        },
        "spec": {
            "secretTargetRef": [{
                "parameter": "connection",
                "name": scenario.secret(),
                "key": SECRET_CONNECTION_KEY,
            }],
        },
    })
}

/// ScaledObject binding the workload to the queue-topic trigger.
///
/// References the workload and the TriggerAuthentication by name;
/// both must exist before this object is applied.
pub fn scaled_object(scenario: &Scenario, trigger: &QueueTriggerConfig) -> Value {
    json!({
        "apiVersion": "keda.sh/v1alpha1",
        "kind": "ScaledObject",
        "metadata": {
            "name": scenario.scaled_object(),
            "namespace": scenario.namespace(),
        },
        "spec": {
            "scaleTargetRef": { "name": scenario.workload() },
            "pollingInterval": trigger.polling_interval_secs,
            "cooldownPeriod": trigger.cooldown_period_secs,
            "minReplicaCount": trigger.min_replicas,
            "maxReplicaCount": trigger.max_replicas,
            "triggers": [{
                "type": "azure-servicebus",
                "metadata": {
                    "topicName": trigger.topic,
                    "subscriptionName": trigger.subscription,
                },
                "authenticationRef": { "name": trigger.auth_ref },
            }],
        },
    })
}
