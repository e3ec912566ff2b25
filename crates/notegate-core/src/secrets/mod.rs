//! Secrets handling.
//!
//! - `ApiKey`: wrapper around the upstream access key that prevents accidental logging
//! - `scrub_secret`: redact a known secret from error messages

use secrecy::{ExposeSecret, SecretBox};

/// Access key wrapper that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it never shows up
/// in `Debug` or `Display` output.
#[derive(Clone)]
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    /// Create a new access key.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self(SecretBox::new(key.into_boxed_str()))
    }

    /// Create an access key from an optional, possibly blank, value.
    ///
    /// Returns `None` for missing or whitespace-only input.
    #[must_use]
    pub fn from_optional(key: Option<&str>) -> Option<Self> {
        key.map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Self::new(k.to_string()))
    }

    /// Expose the secret for the actual upstream call.
    ///
    /// Use sparingly - only when building the outgoing request.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Replace every occurrence of `secret` in `text` with `[REDACTED]`.
///
/// Used before logging upstream error bodies, which occasionally echo
/// request headers back.
#[must_use]
pub fn scrub_secret(text: &str, secret: &ApiKey) -> String {
    let raw = secret.expose();
    if raw.is_empty() {
        return text.to_string();
    }
    text.replace(raw, "[REDACTED]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_redacted() {
        let key = ApiKey::new("army-secret-123".to_string());
        assert_eq!(format!("{key:?}"), "ApiKey([REDACTED])");
        assert_eq!(format!("{key}"), "[REDACTED]");
        assert_eq!(key.expose(), "army-secret-123");
    }

    #[test]
    fn test_from_optional() {
        assert!(ApiKey::from_optional(None).is_none());
        assert!(ApiKey::from_optional(Some("   ")).is_none());
        let key = ApiKey::from_optional(Some(" abc ")).unwrap();
        assert_eq!(key.expose(), "abc");
    }

    #[test]
    fn test_scrub_secret() {
        let key = ApiKey::new("sk-42".to_string());
        let scrubbed = scrub_secret("bad header Authorization: sk-42", &key);
        assert_eq!(scrubbed, "bad header Authorization: [REDACTED]");
    }
}
