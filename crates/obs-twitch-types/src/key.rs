//! Stream key newtype.

use std::fmt;

use thiserror::Error;

/// A stream key was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamKeyError {
    #[error("stream key is empty")]
    Empty,

    /// The key cannot be passed to the media library as a C string.
    #[error("stream key contains a NUL character")]
    InteriorNul,
}

/// Secret key identifying the channel on the streaming service.
///
/// The key is forwarded verbatim to the service settings. `Debug` and
/// `Display` never print it.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamKey(String);

impl StreamKey {
    /// Wrap a key, rejecting the empty string and embedded NULs.
    pub fn new(key: impl Into<String>) -> Result<Self, StreamKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(StreamKeyError::Empty);
        }
        if key.contains('\0') {
            return Err(StreamKeyError::InteriorNul);
        }
        Ok(Self(key))
    }

    /// The raw key, for handing to the service configuration.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamKey").field(&"<redacted>").finish()
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted {} chars>", self.0.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(StreamKey::new(""), Err(StreamKeyError::Empty));
    }

    #[test]
    fn test_nul_rejected_without_echoing_key() {
        let err = StreamKey::new("live_secret\0tail").unwrap_err();
        assert_eq!(err, StreamKeyError::InteriorNul);
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_key_is_forwarded_verbatim() {
        let key = StreamKey::new("live_1234 abc").unwrap();
        assert_eq!(key.expose(), "live_1234 abc");
    }

    #[test]
    fn test_key_never_formatted() {
        let key = StreamKey::new("secret-value").unwrap();
        assert!(!format!("{key:?}").contains("secret"));
        assert!(!format!("{key}").contains("secret"));
        assert_eq!(format!("{key}"), "<redacted 12 chars>");
    }
}
