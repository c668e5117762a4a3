use serde::{Deserialize, Serialize};

/// Message published on the outbound queue once an upload completed and the
/// request carried a callback key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotification {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "ImageURL")]
    pub image_url: String,
}

impl CompletionNotification {
    pub fn new(id: u64, image_url: impl Into<String>) -> Self {
        Self {
            id,
            image_url: image_url.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
