//! Domain identifiers (strongly-typed handles).
//!
//! # AccessToken と ArtifactRef
//! どちらも中身は文字列ですが、newtype にして混同できないようにしています。
//! - **AccessToken**: Grant の主キー。推測不能な値（`ports::token_generator` 参照）
//! - **ArtifactRef**: ストレージ上の artifact を指すキー（`{token}/{file_name}`）

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading characters kept by [`AccessToken::redacted`].
const REDACTED_PREFIX_LEN: usize = 8;

/// Opaque capability naming a single Grant.
///
/// The full value is a bearer secret for lifecycle operations, so logs should
/// use [`AccessToken::redacted`] instead of `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines (`abcdefgh…`).
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_LEN).collect();
        if prefix.len() < self.0.len() {
            format!("{prefix}…")
        } else {
            prefix
        }
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Storage key of an uploaded artifact, relative to the gateway's bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Key for `file_name` inside the namespace owned by `token`.
    pub fn scoped(token: &AccessToken, file_name: &str) -> Self {
        Self(format!("{}/{}", token.as_str(), file_name))
    }

    pub fn from_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_ref_is_namespaced_by_token() {
        let token = AccessToken::new("tok123");
        let artifact = ArtifactRef::scoped(&token, "boxes.xlsx");

        assert_eq!(artifact.as_str(), "tok123/boxes.xlsx");
    }

    #[test]
    fn prefix_tokens_produce_disjoint_keys() {
        let short = ArtifactRef::scoped(&AccessToken::new("abc"), "a.xlsx");
        let long = ArtifactRef::scoped(&AccessToken::new("abcd"), "a.xlsx");

        assert_ne!(short, long);
        assert!(!long.as_str().starts_with("abc/"));
    }

    #[test]
    fn redacted_token_hides_the_tail() {
        let token = AccessToken::new("0123456789abcdef");
        assert_eq!(token.redacted(), "01234567…");

        let short = AccessToken::new("abc");
        assert_eq!(short.redacted(), "abc");
    }

    #[test]
    fn token_serializes_as_plain_string() {
        let token = AccessToken::new("tok");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"tok\"");
    }
}
