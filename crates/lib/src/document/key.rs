//! Document keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::errors::DocumentError;

const MAX_KEY_LEN: usize = 120;

/// The server-side identity of a document.
///
/// Keys are restricted to URL-safe characters so they can travel in
/// request paths unescaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn new(key: impl Into<String>) -> Result<Self, DocumentError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DocumentError::InvalidKey {
                key,
                reason: "key must not be empty",
            });
        }
        if key.len() >= MAX_KEY_LEN {
            return Err(DocumentError::InvalidKey {
                key,
                reason: "key must be shorter than 120 bytes",
            });
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
        {
            return Err(DocumentError::InvalidKey {
                key,
                reason: "key may only contain alphanumerics, '-', '.', '_' and '~'",
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentKey {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentKey> for String {
    fn from(key: DocumentKey) -> Self {
        key.0
    }
}
