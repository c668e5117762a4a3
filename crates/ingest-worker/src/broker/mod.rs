//! Queue client abstraction
//!
//! The pipeline reads deliveries from a [`MessageSource`] and publishes
//! completion notifications through a [`NotificationPublisher`]. The AMQP
//! implementation lives in [`amqp`]; [`memory`] provides channel-backed
//! implementations for tests and local runs.

pub mod amqp;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

/// Broker operation errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// One message taken from the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned tag used to settle the message.
    pub tag: u64,
    pub body: Vec<u8>,
}

/// What happened to a delivery once the pipeline is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fully handled; the upload committed.
    Processed,
    /// Could not be handled and is not retried.
    Dropped,
}

/// Inbound side of the broker.
#[async_trait]
pub trait MessageSource: Send {
    /// Next delivery, or `None` once the stream is closed for good.
    ///
    /// An `Err` item affects a single delivery; the stream stays usable.
    async fn next_delivery(&mut self) -> Option<BrokerResult<Delivery>>;

    /// Report the outcome of a delivery. Sources consuming with broker
    /// auto-acknowledgement ignore this.
    async fn settle(&mut self, delivery: &Delivery, disposition: Disposition) -> BrokerResult<()>;
}

/// Outbound side of the broker.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish one JSON-encoded message to the notification queue.
    async fn publish(&self, body: &[u8]) -> BrokerResult<()>;
}
