use std::fmt::{Display, Formatter, Result as FmtResult};

/// Where an uploaded object lives: `{path}/{name}` inside the configured bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, path: &str, name: &str) -> Self {
        Self {
            bucket: bucket.into(),
            key: format!("{}/{}", path, name),
        }
    }
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_path_and_name() {
        let location = ObjectLocation::new("mybucket", "test", "a.png");
        assert_eq!(location.key, "test/a.png");
        assert_eq!(location.to_string(), "mybucket/test/a.png");
    }
}
