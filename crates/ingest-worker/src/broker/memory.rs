//! Channel-backed broker implementations.
//!
//! [`ChannelSource`] feeds the pipeline from a tokio channel and records how
//! each delivery was settled; [`RecordingPublisher`] keeps every published
//! body. The pipeline tests drive the controller through these.

use async_trait::async_trait;
use ingest_core::{AckMode, CompletionNotification};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::{BrokerError, BrokerResult, Delivery, Disposition, MessageSource, NotificationPublisher};

/// Producer half of a [`ChannelSource`]. Dropping every sender closes the
/// stream, like a broker connection going away.
#[derive(Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<BrokerResult<Vec<u8>>>,
}

impl ChannelSender {
    /// Queue a message body. Returns false once the source is gone.
    pub fn send(&self, body: impl Into<Vec<u8>>) -> bool {
        self.tx.send(Ok(body.into())).is_ok()
    }

    /// Queue a failed delivery.
    pub fn send_error(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(Err(BrokerError::DeliveryFailed(reason.into())))
            .is_ok()
    }
}

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<BrokerResult<Vec<u8>>>,
    ack_mode: AckMode,
    next_tag: u64,
    settlements: Vec<(u64, Disposition)>,
}

impl ChannelSource {
    pub fn new(ack_mode: AckMode) -> (ChannelSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            rx,
            ack_mode,
            next_tag: 1,
            settlements: Vec::new(),
        };
        (ChannelSender { tx }, source)
    }

    /// `(delivery tag, disposition)` for every settled delivery, in order.
    /// Always empty in auto-ack mode.
    pub fn settlements(&self) -> &[(u64, Disposition)] {
        &self.settlements
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_delivery(&mut self) -> Option<BrokerResult<Delivery>> {
        let item = self.rx.recv().await?;
        let tag = self.next_tag;
        self.next_tag += 1;
        Some(item.map(|body| Delivery { tag, body }))
    }

    async fn settle(&mut self, delivery: &Delivery, disposition: Disposition) -> BrokerResult<()> {
        if self.ack_mode == AckMode::Manual {
            self.settlements.push((delivery.tag, disposition));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Vec<u8>> {
        self.lock().clone()
    }

    /// Published bodies decoded as notifications; bodies that do not decode
    /// are skipped.
    pub fn notifications(&self) -> Vec<CompletionNotification> {
        self.lock()
            .iter()
            .filter_map(|body| serde_json::from_slice(body).ok())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, body: &[u8]) -> BrokerResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrokerError::PublishFailed(
                "injected publish failure".to_string(),
            ));
        }
        self.lock().push(body.to_vec());
        Ok(())
    }
}
