//! Pipeline controller: the consume loop.
//!
//! Messages are handled one at a time in delivery order. Nothing that goes
//! wrong with a single message ends the loop: decode and upload failures drop
//! the message, notification failures are logged after the upload has already
//! committed. The loop ends when the shutdown signal flips or the inbound stream
//! closes.

use ingest_core::{CompletionNotification, UploadRequest};
use std::sync::Arc;
use tokio::sync::watch;

use crate::broker::{Disposition, MessageSource, NotificationPublisher};
use crate::upload::{UploadStage, UploadTask};

/// How one inbound message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Object written and public. `notified` is true when a completion
    /// notification was published.
    Uploaded { notified: bool },
    DecodeFailed,
    UploadFailed(UploadStage),
    /// Object written and public, but the notification could not be encoded
    /// or published.
    NotifyFailed,
}

impl MessageOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            MessageOutcome::Uploaded { .. } | MessageOutcome::NotifyFailed => {
                Disposition::Processed
            }
            MessageOutcome::DecodeFailed | MessageOutcome::UploadFailed(_) => Disposition::Dropped,
        }
    }
}

/// Counters for one run of the consume loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub uploaded: u64,
    pub notified: u64,
    pub decode_failures: u64,
    pub upload_failures: u64,
    pub notify_failures: u64,
    pub source_errors: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Uploaded { notified } => {
                self.uploaded += 1;
                if notified {
                    self.notified += 1;
                }
            }
            MessageOutcome::DecodeFailed => self.decode_failures += 1,
            MessageOutcome::UploadFailed(_) => self.upload_failures += 1,
            MessageOutcome::NotifyFailed => {
                self.uploaded += 1;
                self.notify_failures += 1;
            }
        }
    }
}

pub struct PipelineController {
    upload: UploadTask,
    publisher: Arc<dyn NotificationPublisher>,
    default_path: String,
}

impl PipelineController {
    /// `default_path` is the folder used for requests without a `Path`.
    pub fn new(
        upload: UploadTask,
        publisher: Arc<dyn NotificationPublisher>,
        default_path: impl Into<String>,
    ) -> Self {
        Self {
            upload,
            publisher,
            default_path: default_path.into(),
        }
    }

    /// Consume `source` until `shutdown` becomes true (or its sender is
    /// dropped) or the source is exhausted.
    ///
    /// The shutdown signal is observed between messages; a message already
    /// being handled runs to completion.
    pub async fn run<S>(&self, source: &mut S, mut shutdown: watch::Receiver<bool>) -> PipelineStats
    where
        S: MessageSource + ?Sized,
    {
        let mut stats = PipelineStats::default();

        tracing::info!(
            bucket = %self.upload.bucket(),
            default_path = %self.default_path,
            "Waiting for messages"
        );

        loop {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, no longer consuming");
                break;
            }

            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::info!("Shutdown channel closed, no longer consuming");
                        break;
                    }
                    continue;
                }
                next = source.next_delivery() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    stats.source_errors += 1;
                    tracing::error!(error = %e, "Failed to receive delivery");
                    continue;
                }
                None => {
                    tracing::warn!("Inbound stream closed");
                    break;
                }
            };

            stats.received += 1;
            let outcome = self.handle_delivery(&delivery.body).await;
            stats.record(outcome);

            if let Err(e) = source.settle(&delivery, outcome.disposition()).await {
                tracing::error!(
                    error = %e,
                    delivery_tag = delivery.tag,
                    disposition = ?outcome.disposition(),
                    "Failed to settle delivery"
                );
            }
        }

        tracing::info!(
            received = stats.received,
            uploaded = stats.uploaded,
            notified = stats.notified,
            decode_failures = stats.decode_failures,
            upload_failures = stats.upload_failures,
            notify_failures = stats.notify_failures,
            source_errors = stats.source_errors,
            "Consume loop stopped"
        );

        stats
    }

    /// Decode, upload and, when asked for, notify for one message body.
    #[tracing::instrument(skip_all, fields(request_id))]
    pub async fn handle_delivery(&self, body: &[u8]) -> MessageOutcome {
        let request = match UploadRequest::decode(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body_bytes = body.len(),
                    "Failed to decode upload request, dropping message"
                );
                return MessageOutcome::DecodeFailed;
            }
        };

        tracing::Span::current().record("request_id", request.id);
        tracing::info!(
            file_name = %request.name,
            path = %request.path,
            callback_key = %request.callback_key,
            size_bytes = request.data.len(),
            declared_size = request.file_size,
            "Received upload request"
        );

        let path = request.resolve_path(&self.default_path).to_string();
        let wants_callback = request.wants_callback();
        let UploadRequest { id, name, data, .. } = request;

        let uploaded = match self.upload.run(&path, &name, data).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    stage = %e.stage(),
                    key = %e.key(),
                    "Upload failed, dropping message"
                );
                return MessageOutcome::UploadFailed(e.stage());
            }
        };

        if !wants_callback {
            return MessageOutcome::Uploaded { notified: false };
        }

        let notification = CompletionNotification::new(id, uploaded.url);
        if self.notify(&notification).await {
            MessageOutcome::Uploaded { notified: true }
        } else {
            MessageOutcome::NotifyFailed
        }
    }

    async fn notify(&self, notification: &CompletionNotification) -> bool {
        tracing::info!(image_url = %notification.image_url, "Publishing completion notification");

        let body = match notification.encode() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode completion notification");
                return false;
            }
        };

        match self.publisher.publish(&body).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    image_url = %notification.image_url,
                    "Failed to publish completion notification; upload is kept"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::RecordingPublisher;
    use ingest_storage::MemoryStorage;

    fn controller() -> (Arc<MemoryStorage>, Arc<RecordingPublisher>, PipelineController) {
        let storage = Arc::new(MemoryStorage::new(
            "mybucket",
            "https://storage.googleapis.com",
        ));
        let publisher = Arc::new(RecordingPublisher::new());
        let controller = PipelineController::new(
            UploadTask::new(storage.clone()),
            publisher.clone(),
            "test",
        );
        (storage, publisher, controller)
    }

    #[tokio::test]
    async fn uploads_and_notifies() {
        let (storage, publisher, controller) = controller();

        let outcome = controller
            .handle_delivery(br#"{"ID":1,"Name":"a.png","Path":"test","Data":"AQIDBAU=","CallbackKey":"cb"}"#)
            .await;

        assert_eq!(outcome, MessageOutcome::Uploaded { notified: true });
        assert!(storage.is_public("test/a.png"));
        assert_eq!(
            publisher.notifications(),
            vec![CompletionNotification::new(
                1,
                "https://storage.googleapis.com/mybucket/test/a.png"
            )]
        );
    }

    #[tokio::test]
    async fn empty_path_uses_default_folder() {
        let (storage, publisher, controller) = controller();

        let outcome = controller
            .handle_delivery(br#"{"ID":5,"Name":"b.txt","Data":"eA==","CallbackKey":"cb"}"#)
            .await;

        assert_eq!(outcome, MessageOutcome::Uploaded { notified: true });
        assert!(storage.is_public("test/b.txt"));
        assert_eq!(
            publisher.notifications()[0].image_url,
            "https://storage.googleapis.com/mybucket/test/b.txt"
        );
    }

    #[tokio::test]
    async fn absolute_path_is_kept_in_key_and_url() {
        let (storage, publisher, controller) = controller();

        let outcome = controller
            .handle_delivery(br#"{"ID":1,"Name":"a.png","Path":"/images","Data":"AQ==","CallbackKey":"cb"}"#)
            .await;

        assert_eq!(outcome, MessageOutcome::Uploaded { notified: true });
        assert_eq!(storage.object("/images/a.png"), Some(vec![1]));
        assert!(storage.is_public("/images/a.png"));
        assert_eq!(
            publisher.notifications()[0].image_url,
            "https://storage.googleapis.com/mybucket//images/a.png"
        );
    }

    #[tokio::test]
    async fn lowercase_field_names_are_accepted() {
        let (storage, publisher, controller) = controller();

        let outcome = controller
            .handle_delivery(br#"{"id":1,"name":"a.png","path":"test","data":"AQ==","callbackKey":"cb"}"#)
            .await;

        assert_eq!(outcome, MessageOutcome::Uploaded { notified: true });
        assert!(storage.is_public("test/a.png"));
        assert_eq!(publisher.notifications()[0].id, 1);
    }

    #[tokio::test]
    async fn publish_failure_keeps_upload() {
        let (storage, publisher, controller) = controller();
        publisher.fail_publishes(true);

        let outcome = controller
            .handle_delivery(br#"{"ID":2,"Name":"a.png","Path":"test","CallbackKey":"cb"}"#)
            .await;

        assert_eq!(outcome, MessageOutcome::NotifyFailed);
        assert_eq!(outcome.disposition(), Disposition::Processed);
        assert!(storage.is_public("test/a.png"));
        assert!(publisher.published().is_empty());
    }

    #[test]
    fn dispositions() {
        assert_eq!(
            MessageOutcome::Uploaded { notified: false }.disposition(),
            Disposition::Processed
        );
        assert_eq!(MessageOutcome::DecodeFailed.disposition(), Disposition::Dropped);
        assert_eq!(
            MessageOutcome::UploadFailed(UploadStage::Acl).disposition(),
            Disposition::Dropped
        );
    }

    #[test]
    fn stats_count_notify_failures_as_uploads() {
        let mut stats = PipelineStats::default();
        stats.record(MessageOutcome::NotifyFailed);
        stats.record(MessageOutcome::Uploaded { notified: true });

        assert_eq!(stats.uploaded, 2);
        assert_eq!(stats.notified, 1);
        assert_eq!(stats.notify_failures, 1);
    }
}
