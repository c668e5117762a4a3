//! Domain models carried on the queues and passed between pipeline stages.

pub mod location;
pub mod notification;
pub mod upload;

pub use location::ObjectLocation;
pub use notification::CompletionNotification;
pub use upload::UploadRequest;
