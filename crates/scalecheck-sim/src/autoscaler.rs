//! Simulated queue-depth autoscaler.
//!
//! Plays the role of the external scaler under test: on its own
//! polling cadence it reads each applied ScaledObject, checks the
//! depth of the referenced subscription, and sets the target
//! workload's replicas to the max bound when messages are waiting and
//! the min bound when the subscription is empty.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broker::SimBroker;
use crate::cluster::SimCluster;

pub struct SimAutoscaler {
    cluster: SimCluster,
    broker: SimBroker,
}

impl SimAutoscaler {
    pub fn new(cluster: SimCluster, broker: SimBroker) -> Self {
        Self { cluster, broker }
    }

    /// Evaluate every ScaledObject once.
    pub fn tick(&self) {
        for so in self.cluster.scaled_objects() {
            let (Some(namespace), Some(target)) = (
                so["metadata"]["namespace"].as_str(),
                so["spec"]["scaleTargetRef"]["name"].as_str(),
            ) else {
                continue;
            };
            let trigger = &so["spec"]["triggers"][0]["metadata"];
            let (Some(topic), Some(subscription)) = (
                trigger["topicName"].as_str(),
                trigger["subscriptionName"].as_str(),
            ) else {
                continue;
            };

            let min = so["spec"]["minReplicaCount"].as_u64().unwrap_or(0) as u32;
            let max = so["spec"]["maxReplicaCount"].as_u64().unwrap_or(1) as u32;

            let depth = self.broker.depth(topic, subscription);
            let desired = if depth > 0 { max } else { min };

            debug!(namespace, target, depth, desired, "sim scaler tick");
            self.cluster.set_replicas(namespace, target, desired);
        }
    }

    /// Run the scaler loop until the shutdown signal flips.
    pub fn spawn(self, interval: Duration) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "sim scaler started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => self.tick(),
                    _ = shutdown_rx.changed() => {
                        info!("sim scaler shutting down");
                        break;
                    }
                }
            }
        });
        (handle, shutdown_tx)
    }
}
