//! Identifier normalization and key naming conventions.
//!
//! The same logical record has been written under several names over time:
//! `newsletter:<id>`, `article:<id>`, or the bare id. Candidates are probed
//! in a fixed order and the wildcard scan always comes last.

use std::fmt;

use serde::Serialize;

use crate::newsletter::ResolveError;

/// A trimmed, non-empty newsletter identifier without any key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewsletterId(String);

impl NewsletterId {
    /// Parse a client-supplied id.
    ///
    /// A value that already carries one of `prefixes` (`newsletter:abc`) is
    /// reduced to its bare part so candidates never double the prefix.
    pub fn parse(raw: Option<&str>, prefixes: &[String]) -> Result<Self, ResolveError> {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        let bare = strip_known_prefix(trimmed, prefixes).trim();

        if bare.is_empty() {
            return Err(ResolveError::MissingId);
        }
        Ok(Self(bare.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NewsletterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_known_prefix<'a>(raw: &'a str, prefixes: &[String]) -> &'a str {
    for prefix in prefixes {
        if let Some(rest) = raw
            .strip_prefix(prefix.as_str())
            .and_then(|r| r.strip_prefix(':'))
        {
            return rest;
        }
    }
    raw
}

/// How a key was derived from an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "prefix", rename_all = "lowercase")]
pub enum KeyPattern {
    Prefixed(String),
    Raw,
    Wildcard,
}

impl KeyPattern {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &str {
        match self {
            KeyPattern::Prefixed(prefix) => prefix,
            KeyPattern::Raw => "raw",
            KeyPattern::Wildcard => "wildcard",
        }
    }
}

/// A concrete key to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCandidate {
    pub key: String,
    pub pattern: KeyPattern,
}

/// Build `<prefix>:<id>` for a prefix.
pub fn prefixed_key(prefix: &str, id: &NewsletterId) -> String {
    format!("{prefix}:{id}")
}

/// Exact-key candidates in probe order: each prefix, then the raw id.
pub fn candidates(id: &NewsletterId, prefixes: &[String], include_raw: bool) -> Vec<KeyCandidate> {
    let mut out: Vec<KeyCandidate> = prefixes
        .iter()
        .map(|prefix| KeyCandidate {
            key: prefixed_key(prefix, id),
            pattern: KeyPattern::Prefixed(prefix.clone()),
        })
        .collect();

    if include_raw && !out.iter().any(|c| c.key == id.as_str()) {
        out.push(KeyCandidate {
            key: id.as_str().to_string(),
            pattern: KeyPattern::Raw,
        });
    }
    out
}

/// `SCAN MATCH` pattern finding `<anything>:<id>`.
pub fn wildcard_pattern(id: &NewsletterId) -> String {
    format!("*:{}", escape_glob(id.as_str()))
}

/// Escape Redis glob metacharacters.
pub fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["newsletter".to_string(), "article".to_string()]
    }

    #[test]
    fn test_missing_or_blank_id() {
        assert!(matches!(NewsletterId::parse(None, &prefixes()), Err(ResolveError::MissingId)));
        assert!(matches!(NewsletterId::parse(Some("   "), &prefixes()), Err(ResolveError::MissingId)));
        assert!(matches!(
            NewsletterId::parse(Some("newsletter:"), &prefixes()),
            Err(ResolveError::MissingId)
        ));
    }

    #[test]
    fn test_strips_known_prefix_and_whitespace() {
        let id = NewsletterId::parse(Some("  article:abc-123 "), &prefixes()).unwrap();
        assert_eq!(id.as_str(), "abc-123");

        // Unknown prefixes are part of the id.
        let id = NewsletterId::parse(Some("mail:abc"), &prefixes()).unwrap();
        assert_eq!(id.as_str(), "mail:abc");
    }

    #[test]
    fn test_candidate_order() {
        let id = NewsletterId::parse(Some("42"), &prefixes()).unwrap();
        let keys: Vec<_> = candidates(&id, &prefixes(), true)
            .into_iter()
            .map(|c| (c.key, c.pattern))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("newsletter:42".to_string(), KeyPattern::Prefixed("newsletter".into())),
                ("article:42".to_string(), KeyPattern::Prefixed("article".into())),
                ("42".to_string(), KeyPattern::Raw),
            ]
        );
    }

    #[test]
    fn test_candidates_without_raw() {
        let id = NewsletterId::parse(Some("42"), &prefixes()).unwrap();
        assert_eq!(candidates(&id, &prefixes(), false).len(), 2);
    }

    #[test]
    fn test_wildcard_escapes_glob() {
        let id = NewsletterId::parse(Some("a*b?[c]"), &prefixes()).unwrap();
        assert_eq!(wildcard_pattern(&id), "*:a\\*b\\?\\[c\\]");
    }
}
