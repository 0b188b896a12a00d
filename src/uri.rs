//! Source URI - Global, stable identity for every source in the graph
//!
//! A source URI is any `scheme:remainder` string without whitespace, e.g.:
//! - `http://example.org/people/ada`
//! - `urn:isbn:0-486-27557-4`
//!
//! Validation is deliberately shallow: the URI is a stable identity key for
//! rows and triples, not something this layer dereferences.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("valid regex"))
}

/// Global, stable URI identifying a source.
///
/// This URI serves as the primary key for:
/// - Source rows in the relational store
/// - Subjects and resource objects in the triple store
/// - Identity-map deduplication of unsaved sources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUri(String);

impl SourceUri {
    /// Parse and validate a URI string.
    ///
    /// The shape check requires a `scheme:` prefix followed by a non-empty
    /// remainder, and rejects whitespace and control characters.
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.is_empty() {
            return Err(Error::Validation("URI must not be empty".to_string()));
        }
        if uri.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::Validation(format!(
                "URI must not contain whitespace or control characters: {}",
                uri
            )));
        }
        let Some(m) = scheme_pattern().find(uri) else {
            return Err(Error::Validation(format!(
                "URI must start with a scheme followed by ':': {}",
                uri
            )));
        };
        if m.end() == uri.len() {
            return Err(Error::Validation(format!(
                "URI must not be a bare scheme: {}",
                uri
            )));
        }
        Ok(Self(uri.to_string()))
    }

    /// Check whether a raw string has a recognizable scheme-like prefix.
    ///
    /// This is the heuristic `find_through` uses to decide between the
    /// source-reference join and the literal join.
    pub fn looks_like_uri(value: &str) -> bool {
        !value.is_empty()
            && !value.chars().any(|c| c.is_whitespace() || c.is_control())
            && scheme_pattern()
                .find(value)
                .is_some_and(|m| m.end() < value.len())
    }

    /// Build a URI under a local namespace: `base` + percent-escaped `name`.
    ///
    /// Used for sources created without an externally assigned URI. `base`
    /// must itself be URI-shaped; a trailing `/` or `#` is appended when the
    /// base has neither.
    pub fn local(base: &str, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::Validation(
                "local name must not be empty".to_string(),
            ));
        }
        let mut uri = Self::parse(base)?.0;
        if !uri.ends_with('/') && !uri.ends_with('#') {
            uri.push('/');
        }
        for c in name.chars() {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                uri.push(c);
            } else {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    uri.push_str(&format!("%{:02X}", byte));
                }
            }
        }
        Ok(Self(uri))
    }

    /// The URI as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the URI, yielding the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for SourceUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for SourceUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceUri {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SourceUri::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let uri = SourceUri::parse("http://example.org/people/ada").unwrap();
        assert_eq!(uri.as_str(), "http://example.org/people/ada");

        assert!(SourceUri::parse("urn:isbn:0-486-27557-4").is_ok());
        assert!(SourceUri::parse("tag:semstore,2024:local").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(SourceUri::parse("").is_err());
        assert!(SourceUri::parse("no-scheme-here").is_err());
        assert!(SourceUri::parse("http://with space").is_err());
        assert!(SourceUri::parse("http:").is_err()); // bare scheme
        assert!(SourceUri::parse("1http://example.org").is_err()); // scheme must start with a letter
    }

    #[test]
    fn test_looks_like_uri() {
        assert!(SourceUri::looks_like_uri("http://example.org/x"));
        assert!(SourceUri::looks_like_uri("urn:x"));
        assert!(!SourceUri::looks_like_uri("plain text"));
        assert!(!SourceUri::looks_like_uri("hello"));
        assert!(!SourceUri::looks_like_uri(""));
    }

    #[test]
    fn test_local_namespace() {
        let uri = SourceUri::local("http://example.org/local", "Ada Lovelace").unwrap();
        assert_eq!(uri.as_str(), "http://example.org/local/Ada%20Lovelace");

        let uri = SourceUri::local("http://example.org/ns#", "plain-name").unwrap();
        assert_eq!(uri.as_str(), "http://example.org/ns#plain-name");

        assert!(SourceUri::local("http://example.org/", "").is_err());
        assert!(SourceUri::local("not a uri", "name").is_err());
    }

    #[test]
    fn test_roundtrip_display_fromstr() {
        let uri: SourceUri = "http://example.org/a".parse().unwrap();
        assert_eq!(uri.to_string(), "http://example.org/a");
    }
}
