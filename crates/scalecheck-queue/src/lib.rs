//! scalecheck-queue — queue client boundary and the load driver.
//!
//! The traits here are the narrow interface the harness needs from a
//! topic/subscription broker: administrative topic management, send,
//! and receive-then-complete consumption. The broker delivers
//! at-least-once; a received message stays redeliverable until it is
//! completed. Completion consumes the handle, so a handle can be
//! completed at most once.

use std::time::Duration;

use thiserror::Error;

pub mod driver;

pub use driver::LoadDriver;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors from the queue service boundary.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("send to {destination} failed: {reason}")]
    Send { destination: String, reason: String },

    #[error("receive from {destination} failed: {reason}")]
    Receive { destination: String, reason: String },

    #[error("complete failed: {reason}")]
    Complete { reason: String },

    #[error("admin operation {operation} on {entity} failed: {reason}")]
    Admin {
        operation: &'static str,
        entity: String,
        reason: String,
    },

    #[error("sent {sent} of {requested} messages before failure: {source}")]
    PartialSend {
        sent: u32,
        requested: u32,
        #[source]
        source: Box<QueueError>,
    },
}

/// Administrative topic and subscription management.
pub trait QueueAdmin {
    fn topic_exists(&self, topic: &str) -> impl Future<Output = QueueResult<bool>>;

    fn create_topic(&self, topic: &str) -> impl Future<Output = QueueResult<()>>;

    fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
    ) -> impl Future<Output = QueueResult<()>>;

    /// Returns the service status code; non-success is reported as a
    /// teardown failure but never aborts a scenario.
    fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
    ) -> impl Future<Output = QueueResult<u16>>;

    /// Returns the service status code, as `delete_subscription`.
    fn delete_topic(&self, topic: &str) -> impl Future<Output = QueueResult<u16>>;
}

/// Send and receive-then-complete data access.
pub trait QueueData {
    /// Delivery handle for one received message. Completion consumes
    /// the handle; the broker redelivers anything never completed.
    type Handle: Send;

    /// Publish the given bodies to a topic.
    fn send(&self, topic: &str, bodies: Vec<Vec<u8>>) -> impl Future<Output = QueueResult<()>>;

    /// Receive up to `max_count` messages from a subscription,
    /// waiting at most `max_wait` for the first one. May return fewer
    /// than `max_count` even when more are pending.
    fn receive(
        &self,
        topic: &str,
        subscription: &str,
        max_count: usize,
        max_wait: Duration,
    ) -> impl Future<Output = QueueResult<Vec<Self::Handle>>>;

    /// Settle one delivery. After this the broker will not redeliver.
    fn complete(&self, handle: Self::Handle) -> impl Future<Output = QueueResult<()>>;
}
