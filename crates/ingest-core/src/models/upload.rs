use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// One file-upload request as published on the inbound queue.
///
/// Field names follow the producers' wire format (`ID`, `Name`, `FileSize`,
/// `Data`, `Path`, `CallbackKey`); the lowercase and camelCase spellings
/// some producers emit are accepted too. Absent fields decode to their zero
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadRequest {
    /// Opaque correlation id, echoed back in the completion notification.
    #[serde(rename = "ID", alias = "id", alias = "Id")]
    pub id: u64,
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    /// Size declared by the producer. Informational only; never checked
    /// against `data.len()`.
    #[serde(rename = "FileSize", alias = "fileSize", alias = "filesize")]
    pub file_size: i64,
    #[serde(rename = "Data", alias = "data", with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Destination folder inside the bucket.
    #[serde(rename = "Path", alias = "path")]
    pub path: String,
    /// Non-empty when the producer wants a completion notification.
    #[serde(rename = "CallbackKey", alias = "callbackKey", alias = "callbackkey")]
    pub callback_key: String,
}

impl UploadRequest {
    /// Decode one inbound message body.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let request: UploadRequest = serde_json::from_slice(body)?;
        if request.name.is_empty() {
            return Err(DecodeError::MissingName { id: request.id });
        }
        Ok(request)
    }

    pub fn wants_callback(&self) -> bool {
        !self.callback_key.is_empty()
    }

    /// Destination folder, falling back to `default_path` when the request
    /// does not name one.
    pub fn resolve_path<'a>(&'a self, default_path: &'a str) -> &'a str {
        if self.path.is_empty() {
            default_path
        } else {
            &self.path
        }
    }
}

/// Byte payloads travel as standard padded base64 strings; `null` is empty.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_format() {
        let body = br#"{"ID":1,"Name":"a.png","FileSize":5,"Data":"aGVsbG8=","Path":"test","CallbackKey":"cb"}"#;
        let request = UploadRequest::decode(body).unwrap();

        assert_eq!(request.id, 1);
        assert_eq!(request.name, "a.png");
        assert_eq!(request.file_size, 5);
        assert_eq!(request.data, b"hello");
        assert_eq!(request.path, "test");
        assert!(request.wants_callback());
    }

    #[test]
    fn accepts_lowercase_and_camel_case_fields() {
        let body = br#"{"id":1,"name":"a.png","fileSize":1,"data":"AQ==","path":"test","callbackKey":"cb"}"#;
        let request = UploadRequest::decode(body).unwrap();

        assert_eq!(request.id, 1);
        assert_eq!(request.name, "a.png");
        assert_eq!(request.file_size, 1);
        assert_eq!(request.data, vec![1]);
        assert_eq!(request.path, "test");
        assert_eq!(request.callback_key, "cb");

        let request = UploadRequest::decode(br#"{"Id":2,"name":"b","callbackkey":"x"}"#).unwrap();
        assert_eq!(request.id, 2);
        assert!(request.wants_callback());
    }

    #[test]
    fn missing_fields_take_zero_values() {
        let request = UploadRequest::decode(br#"{"ID":9,"Name":"empty.bin"}"#).unwrap();

        assert!(request.data.is_empty());
        assert_eq!(request.path, "");
        assert_eq!(request.file_size, 0);
        assert!(!request.wants_callback());
    }

    #[test]
    fn null_data_is_an_empty_payload() {
        let request = UploadRequest::decode(br#"{"ID":2,"Name":"x","Data":null}"#).unwrap();
        assert!(request.data.is_empty());
    }

    #[test]
    fn declared_size_is_not_enforced() {
        let body = br#"{"ID":3,"Name":"x","FileSize":1000,"Data":"AQI="}"#;
        let request = UploadRequest::decode(body).unwrap();
        assert_eq!(request.data, vec![1, 2]);
        assert_eq!(request.file_size, 1000);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = UploadRequest::decode(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = UploadRequest::decode(br#"{"ID":1,"Name":"x","Data":"%%%"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn rejects_empty_name() {
        let err = UploadRequest::decode(br#"{"ID":4,"Path":"test"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingName { id: 4 }));
    }

    #[test]
    fn resolve_path_falls_back_to_default() {
        let mut request = UploadRequest {
            name: "a.png".to_string(),
            ..Default::default()
        };
        assert_eq!(request.resolve_path("test"), "test");

        request.path = "avatars".to_string();
        assert_eq!(request.resolve_path("test"), "avatars");
    }

    #[test]
    fn encodes_payload_as_base64() {
        let request = UploadRequest {
            id: 7,
            name: "b.txt".to_string(),
            data: b"hello".to_vec(),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Data"], "aGVsbG8=");
        assert_eq!(json["ID"], 7);
    }
}
