//! Shared key handling for storage backends.

use crate::{StorageError, StorageResult};

/// Reject keys that address no object.
///
/// Bucket keys are opaque: a leading `/` or a doubled separator is part of the
/// object name. Backends that map keys onto a filesystem apply stricter checks.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.ends_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key '{}' does not name an object",
            key
        )));
    }
    Ok(())
}

/// Content type derived from the key's file extension.
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// `{base}/{bucket}/{key}` with a single slash between parts.
pub fn join_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        assert!(validate_key("test/a.png").is_ok());
        assert!(validate_key("a/b/c.txt").is_ok());
        assert!(validate_key("a..b/c").is_ok());
    }

    #[test]
    fn leading_slash_is_part_of_the_key() {
        assert!(validate_key("/images/a.png").is_ok());
        assert!(validate_key("images//a.png").is_ok());
    }

    #[test]
    fn rejects_keys_without_object_name() {
        assert!(validate_key("").is_err());
        assert!(validate_key("folder/").is_err());
    }

    #[test]
    fn guesses_content_type() {
        assert_eq!(content_type_for("test/a.png"), "image/png");
        assert_eq!(content_type_for("test/blob"), "application/octet-stream");
    }

    #[test]
    fn joins_url_parts() {
        assert_eq!(
            join_url("https://storage.googleapis.com/", "mybucket", "test/a.png"),
            "https://storage.googleapis.com/mybucket/test/a.png"
        );
    }
}
