//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ingest_core::AckMode;
use ingest_storage::MemoryStorage;
use ingest_worker::broker::memory::{ChannelSender, ChannelSource, RecordingPublisher};
use ingest_worker::{PipelineController, UploadTask};
use std::sync::Arc;

pub const BUCKET: &str = "mybucket";
pub const BASE_URL: &str = "https://storage.googleapis.com";
pub const DEFAULT_PATH: &str = "test";

pub struct TestPipeline {
    pub storage: Arc<MemoryStorage>,
    pub publisher: Arc<RecordingPublisher>,
    pub controller: PipelineController,
    pub source: ChannelSource,
}

/// A controller over in-memory storage, plus the sender feeding its source.
pub fn setup_pipeline(ack_mode: AckMode) -> (ChannelSender, TestPipeline) {
    let storage = Arc::new(MemoryStorage::new(BUCKET, BASE_URL));
    let publisher = Arc::new(RecordingPublisher::new());
    let controller = PipelineController::new(
        UploadTask::new(storage.clone()),
        publisher.clone(),
        DEFAULT_PATH,
    );
    let (sender, source) = ChannelSource::new(ack_mode);

    let pipeline = TestPipeline {
        storage,
        publisher,
        controller,
        source,
    };
    (sender, pipeline)
}

/// JSON body of an upload request as producers send it.
pub fn request_body(id: u64, name: &str, path: &str, data: &[u8], callback_key: &str) -> Vec<u8> {
    serde_json::json!({
        "ID": id,
        "Name": name,
        "FileSize": data.len(),
        "Data": STANDARD.encode(data),
        "Path": path,
        "CallbackKey": callback_key,
    })
    .to_string()
    .into_bytes()
}
