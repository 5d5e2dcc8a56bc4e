//! Multi-pattern record lookup.
//!
//! # Responsibilities
//! - Probe exact key candidates in order (prefixed, then raw)
//! - Fall back to a bounded wildcard scan
//! - Accept string (JSON) and hash representations
//! - List every record under the configured prefixes
//!
//! The first hit wins. Keys holding unparseable text or an unsupported
//! Redis type are skipped, not treated as errors. A store failure aborts
//! the lookup.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::newsletter::keys::{self, KeyCandidate, KeyPattern, NewsletterId};
use crate::newsletter::record::{Article, RawRecord, Representation};
use crate::newsletter::ResolveError;
use crate::observability::metrics;
use crate::store::{KvStore, StoreResult, StoredValue};

const EXCERPT_CHARS: usize = 200;

/// Listings walk every key under a prefix.
const LIST_SCAN_UNBOUNDED: usize = usize::MAX;

/// A record found in the store.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub id: NewsletterId,
    pub key: String,
    pub pattern: KeyPattern,
    pub representation: Representation,
    pub record: RawRecord,
    pub article: Article,
}

/// What probing a single key found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Hit { representation: Representation },
    Miss,
    Unparseable,
    UnsupportedType { kind: String },
}

impl AttemptOutcome {
    fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Hit { .. } => "hit",
            AttemptOutcome::Miss => "miss",
            AttemptOutcome::Unparseable => "unparseable",
            AttemptOutcome::UnsupportedType { .. } => "unsupported-type",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeAttempt {
    pub key: String,
    pub pattern: KeyPattern,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Every candidate tried for an id, for the debug surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub id: String,
    pub attempts: Vec<ProbeAttempt>,
    pub wildcard_pattern: Option<String>,
    /// The key a normal lookup would return.
    pub matched: Option<String>,
    pub error: Option<String>,
}

/// Grid entry: the article without its body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub key: String,
    pub title: String,
    pub sender: String,
    pub publish_date: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub is_archived: bool,
    pub excerpt: String,
}

impl ArticleSummary {
    fn new(key: String, article: Article) -> Self {
        let excerpt = excerpt(&article.content);
        Self {
            id: article.id,
            key,
            title: article.title,
            sender: article.sender,
            publish_date: article.publish_date,
            tags: article.tags,
            image_url: article.image_url,
            is_read: article.is_read,
            is_archived: article.is_archived,
            excerpt,
        }
    }
}

/// Stateless lookups over a store with the current resolver settings.
pub struct Resolver<'a, S> {
    store: &'a S,
    settings: &'a ResolverConfig,
}

impl<'a, S: KvStore> Resolver<'a, S> {
    pub fn new(store: &'a S, settings: &'a ResolverConfig) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ResolverConfig {
        self.settings
    }

    pub(crate) fn store_ref(&self) -> &'a S {
        self.store
    }

    /// Normalize a client id, or fail with `MissingId`.
    pub fn parse_id(&self, raw_id: Option<&str>) -> Result<NewsletterId, ResolveError> {
        NewsletterId::parse(raw_id, &self.settings.key_prefixes)
    }

    /// Resolve a client-supplied id to a stored record.
    pub async fn resolve(&self, raw_id: Option<&str>) -> Result<Resolved, ResolveError> {
        let id = self.parse_id(raw_id)?;
        self.resolve_id(&id, self.settings.wildcard_enabled).await
    }

    /// Resolve a normalized id, optionally allowing the wildcard scan.
    pub async fn resolve_id(&self, id: &NewsletterId, allow_wildcard: bool) -> Result<Resolved, ResolveError> {
        let mut attempted = Vec::new();

        let exact = keys::candidates(id, &self.settings.key_prefixes, self.settings.try_raw_key);
        if let Some(found) = self.first_hit(id, &exact, &mut attempted).await? {
            return Ok(found);
        }

        if allow_wildcard {
            let pattern = keys::wildcard_pattern(id);
            attempted.push(pattern.clone());
            let wild = self
                .wildcard_candidates(&pattern, &exact)
                .await
                .map_err(|e| ResolveError::store(&attempted, e))?;
            if let Some(found) = self.first_hit(id, &wild, &mut attempted).await? {
                return Ok(found);
            }
        }

        tracing::debug!(id = %id, attempted = ?attempted, "Newsletter not found");
        metrics::record_lookup("none", "not-found");
        Err(ResolveError::NotFound(id.to_string()))
    }

    /// Walk every candidate without stopping at the first hit.
    pub async fn probe_report(&self, raw_id: Option<&str>) -> Result<ProbeReport, ResolveError> {
        let id = self.parse_id(raw_id)?;
        let mut report = ProbeReport {
            id: id.to_string(),
            attempts: Vec::new(),
            wildcard_pattern: None,
            matched: None,
            error: None,
        };

        let exact = keys::candidates(&id, &self.settings.key_prefixes, self.settings.try_raw_key);
        let mut all = exact.clone();

        if self.settings.wildcard_enabled {
            let pattern = keys::wildcard_pattern(&id);
            match self.wildcard_candidates(&pattern, &exact).await {
                Ok(wild) => all.extend(wild),
                Err(e) => report.error = Some(e.to_string()),
            }
            report.wildcard_pattern = Some(pattern);
        }

        for candidate in all {
            match self.probe(&candidate.key).await {
                Ok((outcome, _)) => {
                    if report.matched.is_none() && matches!(outcome, AttemptOutcome::Hit { .. }) {
                        report.matched = Some(candidate.key.clone());
                    }
                    report.attempts.push(ProbeAttempt {
                        key: candidate.key,
                        pattern: candidate.pattern,
                        outcome,
                    });
                }
                Err(e) => {
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Summaries of every record under the configured prefixes, newest first.
    ///
    /// A record reachable under several prefixes is listed once, under the
    /// first prefix.
    pub async fn list(&self, include_archived: bool) -> Result<Vec<ArticleSummary>, ResolveError> {
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();

        for prefix in &self.settings.key_prefixes {
            let pattern = format!("{}:*", keys::escape_glob(prefix));
            let mut found = self
                .store
                .scan(&pattern, LIST_SCAN_UNBOUNDED)
                .await
                .map_err(|e| ResolveError::store(&[pattern.clone()], e))?;
            found.sort();

            for key in found {
                let (_, record) = self
                    .probe(&key)
                    .await
                    .map_err(|e| ResolveError::store(&[key.clone()], e))?;
                let Some(record) = record else {
                    continue;
                };

                let fallback_id = key.strip_prefix(&format!("{prefix}:")).unwrap_or(&key).to_string();
                let article = Article::from_record(&fallback_id, &record);
                if !seen.insert(article.id.clone()) {
                    continue;
                }
                if article.is_archived && !include_archived {
                    continue;
                }
                summaries.push((article.published_at(), ArticleSummary::new(key, article)));
            }
        }

        summaries.sort_by(|(a_date, a), (b_date, b)| b_date.cmp(a_date).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries.into_iter().map(|(_, summary)| summary).collect())
    }

    async fn first_hit(
        &self,
        id: &NewsletterId,
        candidates: &[KeyCandidate],
        attempted: &mut Vec<String>,
    ) -> Result<Option<Resolved>, ResolveError> {
        for candidate in candidates {
            attempted.push(candidate.key.clone());
            let (outcome, record) = self
                .probe(&candidate.key)
                .await
                .map_err(|e| ResolveError::store(attempted, e))?;

            metrics::record_lookup(candidate.pattern.label(), outcome.label());

            match (outcome, record) {
                (AttemptOutcome::Hit { representation }, Some(record)) => {
                    tracing::debug!(
                        id = %id,
                        key = %candidate.key,
                        pattern = candidate.pattern.label(),
                        "Newsletter resolved"
                    );
                    let article = Article::from_record(id.as_str(), &record);
                    return Ok(Some(Resolved {
                        id: id.clone(),
                        key: candidate.key.clone(),
                        pattern: candidate.pattern.clone(),
                        representation,
                        record,
                        article,
                    }));
                }
                (AttemptOutcome::Unparseable, _) => {
                    tracing::warn!(key = %candidate.key, "Skipping key with non-JSON string value");
                }
                (AttemptOutcome::UnsupportedType { kind }, _) => {
                    tracing::warn!(key = %candidate.key, kind = %kind, "Skipping key with unsupported type");
                }
                _ => {}
            }
        }
        Ok(None)
    }

    async fn probe(&self, key: &str) -> StoreResult<(AttemptOutcome, Option<RawRecord>)> {
        let probed = match self.store.fetch(key).await? {
            StoredValue::Absent => (AttemptOutcome::Miss, None),
            StoredValue::Text(text) => match RawRecord::from_json_str(&text) {
                Some(record) => (
                    AttemptOutcome::Hit {
                        representation: Representation::Json,
                    },
                    Some(record),
                ),
                None => (AttemptOutcome::Unparseable, None),
            },
            StoredValue::Fields(fields) => match RawRecord::from_hash(fields) {
                Some(record) => (
                    AttemptOutcome::Hit {
                        representation: Representation::Hash,
                    },
                    Some(record),
                ),
                None => (AttemptOutcome::Miss, None),
            },
            StoredValue::Other(kind) => (AttemptOutcome::UnsupportedType { kind }, None),
        };
        Ok(probed)
    }

    async fn wildcard_candidates(&self, pattern: &str, exclude: &[KeyCandidate]) -> StoreResult<Vec<KeyCandidate>> {
        let mut found = self.store.scan(pattern, self.settings.wildcard_scan_limit).await?;
        found.sort();
        found.dedup();

        Ok(found
            .into_iter()
            .filter(|key| !exclude.iter().any(|c| &c.key == key))
            .map(|key| KeyCandidate {
                key,
                pattern: KeyPattern::Wildcard,
            })
            .collect())
    }
}

/// Plain-text preview: markup dropped, whitespace collapsed, truncated.
fn excerpt(content: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_CHARS {
        collapsed
    } else {
        let mut cut: String = collapsed.chars().take(EXCERPT_CHARS - 1).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn settings() -> ResolverConfig {
        ResolverConfig::default()
    }

    #[tokio::test]
    async fn test_prefixed_newsletter_wins_over_article() {
        let store = MemoryStore::new();
        store.insert_text("newsletter:1", json!({"title": "From newsletter"}).to_string());
        store.insert_text("article:1", json!({"title": "From article"}).to_string());
        let settings = settings();

        let found = Resolver::new(&store, &settings).resolve(Some("1")).await.unwrap();
        assert_eq!(found.key, "newsletter:1");
        assert_eq!(found.pattern, KeyPattern::Prefixed("newsletter".into()));
        assert_eq!(found.article.title, "From newsletter");
        assert_eq!(found.article.id, "1");
    }

    #[tokio::test]
    async fn test_falls_back_to_article_then_raw() {
        let store = MemoryStore::new();
        store.insert_text("article:2", json!({"subject": "Legacy"}).to_string());
        store.insert_text("3", json!({"title": "Raw"}).to_string());
        let settings = settings();
        let resolver = Resolver::new(&store, &settings);

        assert_eq!(resolver.resolve(Some("2")).await.unwrap().key, "article:2");
        let raw = resolver.resolve(Some("3")).await.unwrap();
        assert_eq!(raw.key, "3");
        assert_eq!(raw.pattern, KeyPattern::Raw);
    }

    #[tokio::test]
    async fn test_hash_representation() {
        let store = MemoryStore::new();
        store.insert_fields("newsletter:h", [("subject", "Hashed"), ("from", "a@b.c")]);
        let settings = settings();

        let found = Resolver::new(&store, &settings).resolve(Some("h")).await.unwrap();
        assert_eq!(found.representation, Representation::Hash);
        assert_eq!(found.article.title, "Hashed");
        assert_eq!(found.article.sender, "a@b.c");
    }

    #[tokio::test]
    async fn test_unparseable_and_wrong_type_are_skipped() {
        let store = MemoryStore::new();
        store.insert_text("newsletter:x", "not json");
        store.insert_list("article:x");
        store.insert_text("x", json!({"title": "Third time"}).to_string());
        let settings = settings();

        let found = Resolver::new(&store, &settings).resolve(Some("x")).await.unwrap();
        assert_eq!(found.key, "x");
    }

    #[tokio::test]
    async fn test_wildcard_fallback() {
        let store = MemoryStore::new();
        store.insert_text("mail:2024:w1", json!({"title": "Found by scan"}).to_string());
        let mut settings = settings();

        let found = Resolver::new(&store, &settings).resolve(Some("w1")).await.unwrap();
        assert_eq!(found.key, "mail:2024:w1");
        assert_eq!(found.pattern, KeyPattern::Wildcard);

        settings.wildcard_enabled = false;
        let err = Resolver::new(&store, &settings).resolve(Some("w1")).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(id) if id == "w1"));
    }

    #[tokio::test]
    async fn test_wildcard_does_not_match_suffix_collisions() {
        let store = MemoryStore::new();
        store.insert_text("newsletter:11", json!({"title": "Eleven"}).to_string());
        let settings = settings();

        let err = Resolver::new(&store, &settings).resolve(Some("1")).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_id() {
        let store = MemoryStore::new();
        let settings = settings();
        let err = Resolver::new(&store, &settings).resolve(None).await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingId));
    }

    #[tokio::test]
    async fn test_store_failure_reports_attempted_keys() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let settings = settings();

        let err = Resolver::new(&store, &settings).resolve(Some("1")).await.unwrap_err();
        match err {
            ResolveError::Store { attempted, .. } => assert_eq!(attempted, vec!["newsletter:1"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_report_lists_every_attempt() {
        let store = MemoryStore::new();
        store.insert_text("newsletter:p", "garbage");
        store.insert_fields("article:p", [("title", "Hash hit")]);
        store.insert_text("old:p", json!({}).to_string());
        let settings = settings();

        let report = Resolver::new(&store, &settings).probe_report(Some("p")).await.unwrap();
        let outcomes: Vec<_> = report
            .attempts
            .iter()
            .map(|a| (a.key.as_str(), a.outcome.label()))
            .collect();

        assert_eq!(
            outcomes,
            vec![
                ("newsletter:p", "unparseable"),
                ("article:p", "hit"),
                ("p", "miss"),
                ("old:p", "hit"),
            ]
        );
        assert_eq!(report.matched.as_deref(), Some("article:p"));
        assert_eq!(report.wildcard_pattern.as_deref(), Some("*:p"));
    }

    #[tokio::test]
    async fn test_list_sorts_and_dedupes() {
        let store = MemoryStore::new();
        store.insert_text(
            "newsletter:a",
            json!({"title": "Older", "publishDate": "2024-01-01T00:00:00Z"}).to_string(),
        );
        store.insert_text(
            "article:a",
            json!({"title": "Duplicate", "publishDate": "2025-01-01T00:00:00Z"}).to_string(),
        );
        store.insert_fields("newsletter:b", [("subject", "Newer"), ("date", "1735689600")]);
        store.insert_text("newsletter:c", json!({"title": "Undated", "content": "<p>Hello <b>there</b></p>"}).to_string());
        store.insert_text(
            "newsletter:d",
            json!({"title": "Archived", "archived": true}).to_string(),
        );
        let settings = settings();
        let resolver = Resolver::new(&store, &settings);

        let list = resolver.list(false).await.unwrap();
        let titles: Vec<_> = list.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older", "Undated"]);
        assert_eq!(list[2].excerpt, "Hello there");

        let with_archived = resolver.list(true).await.unwrap();
        assert_eq!(with_archived.len(), 4);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "word ".repeat(100);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS);
        assert!(cut.ends_with('…'));

        let exact = "x".repeat(EXCERPT_CHARS);
        assert_eq!(excerpt(&exact), exact);
    }

    #[tokio::test]
    async fn test_list_is_not_bounded_by_scan_limit() {
        let store = MemoryStore::new();
        for i in 0..600 {
            store.insert_text(format!("newsletter:n{i:04}"), json!({ "title": format!("Issue {i}") }).to_string());
        }
        let settings = settings();
        assert!(settings.wildcard_scan_limit < 600);

        let list = Resolver::new(&store, &settings).list(false).await.unwrap();
        assert_eq!(list.len(), 600);
    }
}
