//! Media references held by checklist fields.
//!
//! A media field starts as a local payload captured on the device and is
//! replaced by a durable URL once uploaded. On the wire both are plain
//! strings; anything starting with `http` is a URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Wire token written in place of a payload dropped by degraded persistence.
pub const ELIDED_TOKEN: &str = "skipped_too_large";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media payload is empty")]
    Empty,

    #[error("media payload was dropped by degraded session persistence")]
    Elided,

    #[error("media is already uploaded: {0}")]
    AlreadyUploaded(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A photo, video or signature value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaRef {
    /// Durable public URL.
    Url(String),
    /// Base64 payload, optionally a `data:<mime>;base64,` URL.
    Local(String),
    /// Payload dropped to fit the session store quota.
    Elided,
}

/// Decoded local payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    /// MIME type from a data-URL prefix, if one was present.
    pub content_type: Option<String>,
}

impl MediaRef {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http") {
            MediaRef::Url(raw.to_string())
        } else if raw == ELIDED_TOKEN {
            MediaRef::Elided
        } else {
            MediaRef::Local(raw.to_string())
        }
    }

    /// Encode raw bytes as a local payload.
    pub fn from_bytes(bytes: &[u8], content_type: &str) -> Self {
        MediaRef::Local(format!("data:{};base64,{}", content_type, STANDARD.encode(bytes)))
    }

    pub fn as_wire(&self) -> &str {
        match self {
            MediaRef::Url(url) => url,
            MediaRef::Local(payload) => payload,
            MediaRef::Elided => ELIDED_TOKEN,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, MediaRef::Url(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaRef::Local(_))
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            MediaRef::Url(url) => Some(url),
            _ => None,
        }
    }

    /// Approximate stored size, used for quota decisions.
    pub fn wire_len(&self) -> usize {
        self.as_wire().len()
    }

    /// Decode a local payload into bytes.
    pub fn decode(&self) -> Result<MediaPayload, MediaError> {
        let raw = match self {
            MediaRef::Local(raw) => raw,
            MediaRef::Url(url) => return Err(MediaError::AlreadyUploaded(url.clone())),
            MediaRef::Elided => return Err(MediaError::Elided),
        };

        let (content_type, body) = match raw.strip_prefix("data:") {
            Some(rest) => match rest.split_once(',') {
                Some((meta, body)) => {
                    let mime = meta.split(';').next().unwrap_or_default();
                    let mime = (!mime.is_empty()).then(|| mime.to_string());
                    (mime, body)
                }
                None => (None, rest),
            },
            None => (None, raw.as_str()),
        };

        let mut clean: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        if clean.is_empty() {
            return Err(MediaError::Empty);
        }
        let padding = clean.len() % 4;
        if padding > 0 {
            clean.extend(std::iter::repeat('=').take(4 - padding));
        }

        let bytes = STANDARD.decode(clean.as_bytes())?;
        Ok(MediaPayload {
            bytes,
            content_type,
        })
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaRef::Url(url) => write!(f, "{}", url),
            MediaRef::Local(payload) => write!(f, "<local payload, {} bytes>", payload.len()),
            MediaRef::Elided => write!(f, "<elided>"),
        }
    }
}

impl Serialize for MediaRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for MediaRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MediaRef::parse(&raw))
    }
}

/// Deserialize an optional media field, treating `""` as absent.
pub fn deserialize_optional_media<'de, D>(deserializer: D) -> Result<Option<MediaRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(|s| MediaRef::parse(&s)))
}
