//! Record parsing and normalization into the canonical article view.
//!
//! Stored records come in several historical shapes. Older ingests wrote
//! `subject`/`from`/`body`/`date`, newer ones `title`/`sender`/`content`/
//! `publishDate`, and hash-encoded records hold every value as a string.
//! [`Article::from_record`] reconciles all of them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_TITLE: &str = "Untitled Article";
pub const DEFAULT_SENDER: &str = "Unknown Sender";

const TITLE_FIELDS: &[&str] = &["title", "subject"];
const CONTENT_FIELDS: &[&str] = &["content", "body", "html", "text"];
const SENDER_FIELDS: &[&str] = &["sender", "from"];
const DATE_FIELDS: &[&str] = &["publishDate", "date", "receivedAt", "createdAt"];
const IMAGE_FIELDS: &[&str] = &["imageUrl", "image_url", "image", "thumbnail"];
pub(crate) const READ_FIELDS: &[&str] = &["isRead", "read"];
pub(crate) const ARCHIVED_FIELDS: &[&str] = &["isArchived", "archived"];
pub(crate) const TAG_FIELDS: &[&str] = &["tags"];

/// Epoch values above this are milliseconds, below are seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// How a record was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Json,
    Hash,
}

/// A stored record's fields, whatever its shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Parse a JSON string value. Only objects are records.
    pub fn from_json_str(text: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Wrap a hash value. Every field becomes a JSON string.
    pub fn from_hash<I>(hash: I) -> Option<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let fields: Map<String, Value> = hash.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        if fields.is_empty() {
            None
        } else {
            Some(Self { fields })
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// The first alias the record already uses, or the canonical name.
    pub fn field_name_for<'a>(&self, aliases: &[&'a str]) -> &'a str {
        aliases
            .iter()
            .copied()
            .find(|alias| self.contains(alias))
            .unwrap_or(aliases[0])
    }

    fn first_text(&self, fields: &[&str]) -> Option<String> {
        fields.iter().find_map(|f| self.get(f).and_then(text_value))
    }

    fn first_bool(&self, fields: &[&str]) -> Option<bool> {
        fields.iter().find_map(|f| self.get(f).and_then(bool_value))
    }
}

/// The canonical article view served to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub sender: String,
    pub publish_date: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub is_archived: bool,
}

impl Article {
    /// Normalize a record. `fallback_id` is used when the record has no `id`.
    pub fn from_record(fallback_id: &str, record: &RawRecord) -> Self {
        let sender = SENDER_FIELDS
            .iter()
            .find_map(|f| record.get(f).and_then(sender_value));

        Self {
            id: record.first_text(&["id"]).unwrap_or_else(|| fallback_id.to_string()),
            title: record
                .first_text(TITLE_FIELDS)
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            content: record.first_text(CONTENT_FIELDS).unwrap_or_default(),
            sender: sender.unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            publish_date: DATE_FIELDS
                .iter()
                .find_map(|f| record.get(f).and_then(date_value)),
            tags: TAG_FIELDS
                .iter()
                .find_map(|f| record.get(f).and_then(tags_value))
                .unwrap_or_default(),
            image_url: record.first_text(IMAGE_FIELDS),
            is_read: record.first_bool(READ_FIELDS).unwrap_or(false),
            is_archived: record.first_bool(ARCHIVED_FIELDS).unwrap_or(false),
        }
    }

    /// Parsed publish date, for ordering.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.publish_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}

/// Non-empty string or number rendered as text.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Senders are a string, or an object like `{"name": .., "email": ..}`.
fn sender_value(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => ["name", "email"]
            .iter()
            .find_map(|f| obj.get(*f).and_then(text_value)),
        other => text_value(other),
    }
}

fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Dates: epoch numbers become RFC 3339, RFC 2822 email dates are
/// converted, anything else non-empty is passed through.
fn date_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_i64().and_then(epoch_to_rfc3339),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(epoch) = s.parse::<i64>() {
                return epoch_to_rfc3339(epoch);
            }
            if let Ok(date) = DateTime::parse_from_rfc2822(s) {
                return Some(format_utc(date.with_timezone(&Utc)));
            }
            Some(s.to_string())
        }
        _ => None,
    }
}

fn epoch_to_rfc3339(epoch: i64) -> Option<String> {
    let date = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    };
    date.map(format_utc)
}

fn format_utc(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Tags: a JSON array, a JSON-encoded array string, or a comma list.
fn tags_value(value: &Value) -> Option<Vec<String>> {
    let tags: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(text_value).collect(),
        Value::String(s) => {
            let s = s.trim();
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) if s.starts_with('[') => {
                    items.iter().filter_map(text_value).collect()
                }
                _ => s.split(',').map(str::to_string).collect(),
            }
        }
        _ => return None,
    };

    Some(
        tags.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_json_str(&value.to_string()).unwrap()
    }

    #[test]
    fn test_modern_shape() {
        let article = Article::from_record(
            "fallback",
            &record(json!({
                "id": "n1",
                "title": "Weekly Rust",
                "content": "<p>hi</p>",
                "sender": "This Week in Rust",
                "publishDate": "2024-05-01T08:00:00.000Z",
                "tags": ["rust", "weekly"],
                "imageUrl": "https://img.example/1.png",
                "isRead": true,
                "isArchived": false
            })),
        );

        assert_eq!(
            article,
            Article {
                id: "n1".into(),
                title: "Weekly Rust".into(),
                content: "<p>hi</p>".into(),
                sender: "This Week in Rust".into(),
                publish_date: Some("2024-05-01T08:00:00.000Z".into()),
                tags: vec!["rust".into(), "weekly".into()],
                image_url: Some("https://img.example/1.png".into()),
                is_read: true,
                is_archived: false,
            }
        );
    }

    #[test]
    fn test_legacy_shape() {
        let article = Article::from_record(
            "abc",
            &record(json!({
                "subject": "Old Digest",
                "from": {"name": "Digest Bot", "email": "bot@example.com"},
                "body": "plain text",
                "date": "Tue, 1 Jul 2003 10:52:37 +0200",
                "read": "1"
            })),
        );

        assert_eq!(article.id, "abc");
        assert_eq!(article.title, "Old Digest");
        assert_eq!(article.sender, "Digest Bot");
        assert_eq!(article.content, "plain text");
        assert_eq!(article.publish_date.as_deref(), Some("2003-07-01T08:52:37.000Z"));
        assert!(article.is_read);
    }

    #[test]
    fn test_defaults_for_empty_record() {
        let article = Article::from_record("x", &record(json!({"unrelated": 1})));

        assert_eq!(article.title, DEFAULT_TITLE);
        assert_eq!(article.sender, DEFAULT_SENDER);
        assert_eq!(article.content, "");
        assert!(article.tags.is_empty());
        assert_eq!(article.publish_date, None);
        assert_eq!(article.image_url, None);
        assert!(!article.is_read);
        assert!(!article.is_archived);
    }

    #[test]
    fn test_empty_strings_fall_through() {
        let article = Article::from_record(
            "x",
            &record(json!({"title": "", "subject": "Fallback", "sender": " ", "from": "a@b.c"})),
        );
        assert_eq!(article.title, "Fallback");
        assert_eq!(article.sender, "a@b.c");
    }

    #[test]
    fn test_hash_shape() {
        let rec = RawRecord::from_hash([
            ("subject".to_string(), "From a hash".to_string()),
            ("tags".to_string(), "[\"a\", \"b\"]".to_string()),
            ("archived".to_string(), "yes".to_string()),
            ("createdAt".to_string(), "1700000000".to_string()),
        ])
        .unwrap();
        let article = Article::from_record("h1", &rec);

        assert_eq!(article.title, "From a hash");
        assert_eq!(article.tags, vec!["a", "b"]);
        assert!(article.is_archived);
        assert_eq!(article.publish_date.as_deref(), Some("2023-11-14T22:13:20.000Z"));
    }

    #[test]
    fn test_epoch_millis() {
        let article = Article::from_record("x", &record(json!({"date": 1700000000123i64})));
        assert_eq!(article.publish_date.as_deref(), Some("2023-11-14T22:13:20.123Z"));
    }

    #[test]
    fn test_comma_tags() {
        let article = Article::from_record("x", &record(json!({"tags": " rust, ,tokio "})));
        assert_eq!(article.tags, vec!["rust", "tokio"]);
    }

    #[test]
    fn test_unparseable_values_rejected() {
        assert!(RawRecord::from_json_str("not json").is_none());
        assert!(RawRecord::from_json_str("[1, 2]").is_none());
        assert!(RawRecord::from_json_str("\"just a string\"").is_none());
        assert!(RawRecord::from_hash(Vec::new()).is_none());
    }

    #[test]
    fn test_field_name_for_prefers_existing_alias() {
        let rec = record(json!({"read": false}));
        assert_eq!(rec.field_name_for(READ_FIELDS), "read");
        assert_eq!(rec.field_name_for(ARCHIVED_FIELDS), "isArchived");
    }

    #[test]
    fn test_serializes_camel_case() {
        let article = Article::from_record("x", &record(json!({})));
        let value = serde_json::to_value(&article).unwrap();
        assert!(value.get("publishDate").is_some());
        assert!(value.get("isArchived").is_some());
        assert!(value.get("imageUrl").is_some());
    }
}
