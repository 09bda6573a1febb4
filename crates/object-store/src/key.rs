use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Segment separator inside a [`BlobKey`].
pub const DELIMITER: char = '/';

/// Key of an object in the remote namespace.
///
/// Always non-empty and never starts with `/`. Beyond that the key is opaque;
/// the backing store decides how long it may be.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey(String);

impl BlobKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key,
                reason: "key must not be empty",
            });
        }
        if key.starts_with(DELIMITER) {
            return Err(StoreError::InvalidKey {
                key,
                reason: "key must not start with '/'",
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/` separated segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(DELIMITER)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlobKey {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BlobKey {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl FromStr for BlobKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<BlobKey> for String {
    fn from(key: BlobKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key() {
        let key = BlobKey::new("site/en/index.html").unwrap();
        assert_eq!(key.as_str(), "site/en/index.html");
        assert_eq!(
            key.segments().collect::<Vec<_>>(),
            vec!["site", "en", "index.html"]
        );
    }

    #[test]
    fn test_rejects_empty_and_leading_slash() {
        assert!(matches!(
            BlobKey::new(""),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            BlobKey::new("/abs/key"),
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_serde_validates() {
        let key: BlobKey = serde_json::from_str(r#""a/b""#).unwrap();
        assert_eq!(key.as_str(), "a/b");
        assert!(serde_json::from_str::<BlobKey>(r#""/a""#).is_err());
    }
}
