//! Simulated topic/subscription broker.
//!
//! At-least-once semantics: a received message moves to an in-flight
//! set and stays there until completed; `redeliver` returns in-flight
//! messages to the pending queue the way a lock expiry would. Every
//! subscription gets its own copy of each published message.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use scalecheck_queue::{QueueAdmin, QueueData, QueueError, QueueResult};

/// How often a blocked receive re-checks the pending queue.
const RECEIVE_POLL: Duration = Duration::from_millis(25);

#[derive(Default)]
struct SubQueue {
    pending: VecDeque<(u64, Vec<u8>)>,
    inflight: HashMap<u64, Vec<u8>>,
}

#[derive(Default)]
struct Topic {
    subscriptions: HashMap<String, SubQueue>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Topic>,
    next_id: u64,
}

/// Delivery handle for one received message.
///
/// Not `Clone`: completion consumes the handle, so a delivery can be
/// completed at most once from this process.
#[derive(Debug)]
pub struct SimHandle {
    topic: String,
    subscription: String,
    id: u64,
}

/// In-memory broker. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct SimBroker {
    inner: Arc<Mutex<BrokerState>>,
}

impl SimBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages not yet completed (pending plus in-flight), which is
    /// the depth a queue-based scaler observes.
    pub fn depth(&self, topic: &str, subscription: &str) -> usize {
        let state = self.inner.lock().unwrap();
        state
            .topics
            .get(topic)
            .and_then(|t| t.subscriptions.get(subscription))
            .map(|s| s.pending.len() + s.inflight.len())
            .unwrap_or(0)
    }

    /// Return every in-flight message to the pending queue, as the
    /// broker does when a delivery lock expires without completion.
    pub fn redeliver(&self, topic: &str, subscription: &str) {
        let mut state = self.inner.lock().unwrap();
        if let Some(sub) = state
            .topics
            .get_mut(topic)
            .and_then(|t| t.subscriptions.get_mut(subscription))
        {
            let returned: Vec<_> = sub.inflight.drain().collect();
            debug!(count = returned.len(), topic, subscription, "sim: redelivering");
            for (id, body) in returned {
                sub.pending.push_back((id, body));
            }
        }
    }
}

impl QueueAdmin for SimBroker {
    async fn topic_exists(&self, topic: &str) -> QueueResult<bool> {
        Ok(self.inner.lock().unwrap().topics.contains_key(topic))
    }

    async fn create_topic(&self, topic: &str) -> QueueResult<()> {
        let mut state = self.inner.lock().unwrap();
        if state.topics.contains_key(topic) {
            return Err(QueueError::Admin {
                operation: "create_topic",
                entity: topic.to_string(),
                reason: "already exists".into(),
            });
        }
        state.topics.insert(topic.to_string(), Topic::default());
        Ok(())
    }

    async fn create_subscription(&self, topic: &str, subscription: &str) -> QueueResult<()> {
        let mut state = self.inner.lock().unwrap();
        let t = state.topics.get_mut(topic).ok_or_else(|| QueueError::Admin {
            operation: "create_subscription",
            entity: topic.to_string(),
            reason: "topic does not exist".into(),
        })?;
        t.subscriptions
            .insert(subscription.to_string(), SubQueue::default());
        Ok(())
    }

    async fn delete_subscription(&self, topic: &str, subscription: &str) -> QueueResult<u16> {
        let mut state = self.inner.lock().unwrap();
        match state.topics.get_mut(topic) {
            Some(t) => {
                if t.subscriptions.remove(subscription).is_some() {
                    Ok(200)
                } else {
                    Ok(404)
                }
            }
            None => Ok(404),
        }
    }

    async fn delete_topic(&self, topic: &str) -> QueueResult<u16> {
        let mut state = self.inner.lock().unwrap();
        match state.topics.remove(topic) {
            Some(_) => Ok(200),
            None => Ok(404),
        }
    }
}

impl QueueData for SimBroker {
    type Handle = SimHandle;

    async fn send(&self, topic: &str, bodies: Vec<Vec<u8>>) -> QueueResult<()> {
        let mut state = self.inner.lock().unwrap();
        let state = &mut *state;
        let t = state.topics.get_mut(topic).ok_or_else(|| QueueError::Send {
            destination: topic.to_string(),
            reason: "topic does not exist".into(),
        })?;
        for body in bodies {
            let id = state.next_id;
            state.next_id += 1;
            // Each subscription receives its own copy.
            for sub in t.subscriptions.values_mut() {
                sub.pending.push_back((id, body.clone()));
            }
        }
        Ok(())
    }

    async fn receive(
        &self,
        topic: &str,
        subscription: &str,
        max_count: usize,
        max_wait: Duration,
    ) -> QueueResult<Vec<SimHandle>> {
        let deadline = Instant::now() + max_wait;
        loop {
            {
                let mut state = self.inner.lock().unwrap();
                let sub = state
                    .topics
                    .get_mut(topic)
                    .and_then(|t| t.subscriptions.get_mut(subscription))
                    .ok_or_else(|| QueueError::Receive {
                        destination: format!("{topic}/{subscription}"),
                        reason: "subscription does not exist".into(),
                    })?;

                if !sub.pending.is_empty() {
                    let take = max_count.min(sub.pending.len());
                    let handles = sub
                        .pending
                        .drain(..take)
                        .map(|(id, body)| {
                            sub.inflight.insert(id, body);
                            SimHandle {
                                topic: topic.to_string(),
                                subscription: subscription.to_string(),
                                id,
                            }
                        })
                        .collect();
                    return Ok(handles);
                }
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(RECEIVE_POLL).await;
        }
    }

    async fn complete(&self, handle: SimHandle) -> QueueResult<()> {
        let mut state = self.inner.lock().unwrap();
        let settled = state
            .topics
            .get_mut(&handle.topic)
            .and_then(|t| t.subscriptions.get_mut(&handle.subscription))
            .and_then(|s| s.inflight.remove(&handle.id));

        match settled {
            Some(_) => Ok(()),
            None => Err(QueueError::Complete {
                reason: format!("delivery {} is unknown or already settled", handle.id),
            }),
        }
    }
}
