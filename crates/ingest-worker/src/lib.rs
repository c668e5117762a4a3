//! Ingest Worker Library
//!
//! Consumes upload requests from the inbound queue, stores each file in the
//! bucket, makes it public and, when the request asks for it, publishes a
//! completion notification carrying the object URL.

pub mod broker;
pub mod pipeline;
pub mod telemetry;
pub mod upload;

pub use broker::{BrokerError, BrokerResult, Delivery, Disposition, MessageSource, NotificationPublisher};
pub use pipeline::{MessageOutcome, PipelineController, PipelineStats};
pub use upload::{UploadError, UploadOutcome, UploadStage, UploadTask, UploadedObject};
