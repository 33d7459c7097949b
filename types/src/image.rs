//! Encoded still images (profile captures and verification evidence).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProfileError;

/// An encoded still image such as a JPEG snapshot of a camera frame.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new("image/jpeg", bytes)
    }

    /// Render as `data:<mime>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Parse a base64 `data:` URL.
    pub fn from_data_url(url: &str) -> Result<Self, ProfileError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ProfileError::InvalidDataUrl("missing data: prefix".into()))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| ProfileError::InvalidDataUrl("not base64 encoded".into()))?;
        if mime.is_empty() {
            return Err(ProfileError::InvalidDataUrl("empty mime type".into()));
        }
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ProfileError::InvalidDataUrl(e.to_string()))?;
        Ok(Self::new(mime, bytes))
    }
}

// Image bytes are biometric evidence and never end up in logs.
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}
