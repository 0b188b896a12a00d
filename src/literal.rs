//! Literal values - string-valued objects with optional language/datatype
//!
//! Wire form: `value[^^datatype][@lang]`, either suffix optional, either
//! order accepted. Parsing splits the suffixes off; re-encoding the parts
//! reproduces the original string byte for byte.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which suffix came first in the wire form.
///
/// Kept so that `encode()` can reproduce the parsed input exactly; it is
/// presentation only and does not participate in equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuffixOrder {
    /// `value^^datatype@lang`
    #[default]
    DatatypeFirst,
    /// `value@lang^^datatype`
    LangFirst,
}

/// A literal split into its value and optional datatype/language parts.
#[derive(Debug, Clone, Eq)]
pub struct ParsedLiteral {
    /// The bare value with all suffixes removed
    pub value: String,
    /// Datatype suffix (`^^datatype`), if present
    pub datatype: Option<String>,
    /// Language suffix (`@lang`), if present
    pub lang: Option<String>,
    order: SuffixOrder,
}

impl ParsedLiteral {
    /// A plain literal with no suffixes
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            lang: None,
            order: SuffixOrder::default(),
        }
    }

    /// Set the datatype suffix
    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    /// Set the language suffix
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Parse a wire-form literal.
    ///
    /// At most one `@lang` and one `^^datatype` suffix are peeled from the
    /// end of the string, whichever occurs later first. A marker with an
    /// empty token is not a suffix and stays part of the value, as does any
    /// second occurrence of a suffix kind.
    pub fn parse(text: &str) -> Self {
        let mut rest = text;
        let mut datatype: Option<String> = None;
        let mut lang: Option<String> = None;
        // Set when both suffixes are present; records which one the wire
        // form puts first.
        let mut order = SuffixOrder::default();

        loop {
            let dt_pos = if datatype.is_none() {
                rest.rfind("^^")
            } else {
                None
            };
            let lang_pos = if lang.is_none() { rest.rfind('@') } else { None };

            match (dt_pos, lang_pos) {
                (Some(d), Some(l)) if d > l => {
                    if !Self::peel_datatype(&mut rest, d, &mut datatype) {
                        break;
                    }
                }
                (Some(d), None) => {
                    if !Self::peel_datatype(&mut rest, d, &mut datatype) {
                        break;
                    }
                }
                (_, Some(l)) => {
                    if !Self::peel_lang(&mut rest, l, &mut lang) {
                        break;
                    }
                }
                (None, None) => break,
            }

            if datatype.is_some() && lang.is_some() {
                // Whichever suffix starts right after the value came first.
                order = if text[rest.len()..].starts_with("^^") {
                    SuffixOrder::DatatypeFirst
                } else {
                    SuffixOrder::LangFirst
                };
                break;
            }
        }

        Self {
            value: rest.to_string(),
            datatype,
            lang,
            order,
        }
    }

    fn peel_datatype(rest: &mut &str, pos: usize, datatype: &mut Option<String>) -> bool {
        let token = &rest[pos + 2..];
        if token.is_empty() {
            return false;
        }
        *datatype = Some(token.to_string());
        *rest = &rest[..pos];
        true
    }

    fn peel_lang(rest: &mut &str, pos: usize, lang: &mut Option<String>) -> bool {
        let token = &rest[pos + 1..];
        if token.is_empty() {
            return false;
        }
        *lang = Some(token.to_string());
        *rest = &rest[..pos];
        true
    }

    /// Re-encode into the wire form.
    ///
    /// Inverse of [`ParsedLiteral::parse`]: `encode(parse(s)) == s` for
    /// every input string.
    pub fn encode(&self) -> String {
        let mut out = self.value.clone();
        match (&self.datatype, &self.lang, self.order) {
            (Some(dt), Some(lang), SuffixOrder::DatatypeFirst) => {
                out.push_str("^^");
                out.push_str(dt);
                out.push('@');
                out.push_str(lang);
            }
            (Some(dt), Some(lang), SuffixOrder::LangFirst) => {
                out.push('@');
                out.push_str(lang);
                out.push_str("^^");
                out.push_str(dt);
            }
            (Some(dt), None, _) => {
                out.push_str("^^");
                out.push_str(dt);
            }
            (None, Some(lang), _) => {
                out.push('@');
                out.push_str(lang);
            }
            (None, None, _) => {}
        }
        out
    }
}

impl PartialEq for ParsedLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.datatype == other.datatype && self.lang == other.lang
    }
}

impl fmt::Display for ParsedLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl Serialize for ParsedLiteral {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for ParsedLiteral {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ParsedLiteral::parse(&s))
    }
}

/// A literal row: the full wire-form text plus its id once persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralValue {
    /// Row id in `literal_values`, `None` until persisted
    pub id: Option<i64>,
    /// Full wire-form text (suffixes included)
    pub text: String,
}

impl LiteralValue {
    /// Create a new literal, rejecting blank text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Validation(
                "literal value must not be blank".to_string(),
            ));
        }
        Ok(Self { id: None, text })
    }

    /// Rebuild a literal from a stored row
    pub fn from_row(id: i64, text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            text: text.into(),
        }
    }

    /// Split the wire form into `(value, datatype, lang)` parts
    pub fn parsed(&self) -> ParsedLiteral {
        ParsedLiteral::parse(&self.text)
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) -> ParsedLiteral {
        let parsed = ParsedLiteral::parse(s);
        assert_eq!(parsed.encode(), s, "round trip failed for {:?}", s);
        parsed
    }

    #[test]
    fn test_parse_both_suffixes() {
        let p = roundtrip("hello^^string@en");
        assert_eq!(p.value, "hello");
        assert_eq!(p.datatype.as_deref(), Some("string"));
        assert_eq!(p.lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_reversed_order() {
        let p = roundtrip("hello@en^^string");
        assert_eq!(p.value, "hello");
        assert_eq!(p.datatype.as_deref(), Some("string"));
        assert_eq!(p.lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_single_suffix() {
        let p = roundtrip("42^^http://www.w3.org/2001/XMLSchema#int");
        assert_eq!(p.value, "42");
        assert_eq!(
            p.datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#int")
        );
        assert_eq!(p.lang, None);

        let p = roundtrip("bonjour@fr");
        assert_eq!(p.value, "bonjour");
        assert_eq!(p.lang.as_deref(), Some("fr"));
        assert_eq!(p.datatype, None);
    }

    #[test]
    fn test_parse_plain() {
        let p = roundtrip("just a value");
        assert_eq!(p.value, "just a value");
        assert_eq!(p.datatype, None);
        assert_eq!(p.lang, None);
    }

    #[test]
    fn test_empty_suffix_token_stays_in_value() {
        let p = roundtrip("hello@");
        assert_eq!(p.value, "hello@");

        let p = roundtrip("hello^^");
        assert_eq!(p.value, "hello^^");
    }

    #[test]
    fn test_second_suffix_of_same_kind_stays_in_value() {
        let p = roundtrip("a@en@de");
        assert_eq!(p.value, "a@en");
        assert_eq!(p.lang.as_deref(), Some("de"));

        let p = roundtrip("a^^x^^y");
        assert_eq!(p.value, "a^^x");
        assert_eq!(p.datatype.as_deref(), Some("y"));
    }

    #[test]
    fn test_equality_ignores_suffix_order() {
        let a = ParsedLiteral::parse("v^^dt@en");
        let b = ParsedLiteral::parse("v@en^^dt");
        assert_eq!(a, b);
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_builder_encode() {
        let p = ParsedLiteral::plain("hello")
            .with_datatype("string")
            .with_lang("en");
        assert_eq!(p.encode(), "hello^^string@en");
    }

    #[test]
    fn test_literal_value_validation() {
        assert!(LiteralValue::new("ok").is_ok());
        assert!(LiteralValue::new("").is_err());
        assert!(LiteralValue::new("   ").is_err());
    }
}
