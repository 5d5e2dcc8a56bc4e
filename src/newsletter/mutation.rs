//! Newsletter writes: ingest, flag updates, deletion.
//!
//! Updates are written back in the representation the record was found in,
//! under the field names the record already uses, so legacy records stay
//! readable by anything else that consumes them.

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::newsletter::keys::{self, NewsletterId};
use crate::newsletter::record::{Article, RawRecord, Representation, ARCHIVED_FIELDS, READ_FIELDS, TAG_FIELDS};
use crate::newsletter::resolver::Resolver;
use crate::newsletter::ResolveError;
use crate::store::KvStore;

/// Body of a create request. Legacy field names are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNewsletter {
    pub id: Option<String>,
    #[serde(alias = "subject")]
    pub title: Option<String>,
    #[serde(alias = "body")]
    pub content: Option<String>,
    #[serde(alias = "from")]
    pub sender: Option<String>,
    #[serde(alias = "date")]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

/// Body of an update request. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    pub is_read: Option<bool>,
    pub is_archived: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        self.is_read.is_none() && self.is_archived.is_none() && self.tags.is_none()
    }
}

impl<'a, S: KvStore> Resolver<'a, S> {
    /// Store a new newsletter as a JSON string under the first prefix.
    pub async fn create(&self, input: NewNewsletter) -> Result<Article, ResolveError> {
        let has_title = input.title.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_content = input.content.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !has_title && !has_content {
            return Err(ResolveError::InvalidPayload("title or content is required".into()));
        }

        let id = match input.id.as_deref() {
            Some(raw) => self.parse_id(Some(raw))?,
            None => self.parse_id(Some(&Uuid::new_v4().to_string()))?,
        };

        match self.resolve_id(&id, false).await {
            Ok(_) => return Err(ResolveError::Conflict(id.to_string())),
            Err(ResolveError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let mut record = RawRecord::default();
        record.insert("id", Value::String(id.to_string()));
        put_opt(&mut record, "title", input.title);
        put_opt(&mut record, "content", input.content);
        put_opt(&mut record, "sender", input.sender);
        let publish_date = input
            .publish_date
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        record.insert("publishDate", Value::String(publish_date));
        record.insert(
            "tags",
            Value::Array(input.tags.into_iter().map(Value::String).collect()),
        );
        put_opt(&mut record, "imageUrl", input.image_url);
        record.insert("isRead", Value::Bool(false));
        record.insert("isArchived", Value::Bool(false));

        let key = self.write_key(&id);
        let written = self
            .store_ref()
            .set_string_if_absent(&key, &record.to_json_string())
            .await
            .map_err(|e| ResolveError::store(&[key.clone()], e))?;
        if !written {
            return Err(ResolveError::Conflict(id.to_string()));
        }

        tracing::info!(id = %id, key = %key, "Newsletter created");
        Ok(Article::from_record(id.as_str(), &record))
    }

    /// Apply read/archived/tag changes to an existing record.
    pub async fn update_flags(&self, raw_id: Option<&str>, patch: ArticlePatch) -> Result<Article, ResolveError> {
        if patch.is_empty() {
            return Err(ResolveError::InvalidPayload("no fields to update".into()));
        }

        let resolved = self.resolve(raw_id).await?;
        let mut record = resolved.record;
        let mut changed: Vec<(String, Value)> = Vec::new();

        if let Some(read) = patch.is_read {
            changed.push((record.field_name_for(READ_FIELDS).to_string(), Value::Bool(read)));
        }
        if let Some(archived) = patch.is_archived {
            changed.push((record.field_name_for(ARCHIVED_FIELDS).to_string(), Value::Bool(archived)));
        }
        if let Some(tags) = patch.tags {
            changed.push((
                record.field_name_for(TAG_FIELDS).to_string(),
                Value::Array(tags.into_iter().map(Value::String).collect()),
            ));
        }

        let key = resolved.key;
        let result = match resolved.representation {
            Representation::Json => {
                for (field, value) in &changed {
                    record.insert(field.clone(), value.clone());
                }
                self.store_ref().set_string(&key, &record.to_json_string()).await
            }
            Representation::Hash => {
                let fields: Vec<(String, String)> = changed
                    .iter()
                    .map(|(field, value)| (field.clone(), hash_text(value)))
                    .collect();
                for (field, value) in &fields {
                    record.insert(field.clone(), Value::String(value.clone()));
                }
                self.store_ref().set_fields(&key, &fields).await
            }
        };
        result.map_err(|e| ResolveError::store(&[key.clone()], e))?;

        tracing::info!(key = %key, fields = changed.len(), "Newsletter updated");
        Ok(Article::from_record(resolved.id.as_str(), &record))
    }

    /// Remove the resolved record.
    pub async fn delete(&self, raw_id: Option<&str>) -> Result<(), ResolveError> {
        let resolved = self.resolve(raw_id).await?;
        let removed = self
            .store_ref()
            .delete(&resolved.key)
            .await
            .map_err(|e| ResolveError::store(&[resolved.key.clone()], e))?;

        if !removed {
            return Err(ResolveError::NotFound(resolved.id.to_string()));
        }
        tracing::info!(key = %resolved.key, "Newsletter deleted");
        Ok(())
    }

    fn write_key(&self, id: &NewsletterId) -> String {
        match self.settings().key_prefixes.first() {
            Some(prefix) => keys::prefixed_key(prefix, id),
            None => id.to_string(),
        }
    }
}

fn put_opt(record: &mut RawRecord, field: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        record.insert(field, Value::String(value));
    }
}

/// Hash fields are flat strings; arrays are stored JSON-encoded.
fn hash_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::store::{MemoryStore, StoredValue};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_then_resolve() {
        let store = MemoryStore::new();
        let settings = ResolverConfig::default();
        let resolver = Resolver::new(&store, &settings);

        let created = resolver
            .create(NewNewsletter {
                id: Some("n-1".into()),
                title: Some("Hello".into()),
                tags: vec!["intro".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id, "n-1");
        assert!(created.publish_date.is_some());
        assert_eq!(created.sender, "Unknown Sender");

        let found = resolver.resolve(Some("n-1")).await.unwrap();
        assert_eq!(found.key, "newsletter:n-1");
        assert_eq!(found.article, created);
    }

    #[tokio::test]
    async fn test_create_generates_id() {
        let store = MemoryStore::new();
        let settings = ResolverConfig::default();
        let created = Resolver::new(&store, &settings)
            .create(NewNewsletter {
                content: Some("body only".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.title, "Untitled Article");
    }

    #[tokio::test]
    async fn test_create_conflicts_with_legacy_key() {
        let store = MemoryStore::new();
        store.insert_text("article:dup", json!({"subject": "Old"}).to_string());
        let settings = ResolverConfig::default();

        let err = Resolver::new(&store, &settings)
            .create(NewNewsletter {
                id: Some("dup".into()),
                title: Some("New".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Conflict(id) if id == "dup"));
    }

    #[tokio::test]
    async fn test_create_requires_title_or_content() {
        let store = MemoryStore::new();
        let settings = ResolverConfig::default();
        let err = Resolver::new(&store, &settings)
            .create(NewNewsletter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_update_hash_keeps_legacy_names() {
        let store = MemoryStore::new();
        store.insert_fields("article:h", [("subject", "Legacy"), ("read", "0")]);
        let settings = ResolverConfig::default();

        let article = Resolver::new(&store, &settings)
            .update_flags(
                Some("h"),
                ArticlePatch {
                    is_read: Some(true),
                    tags: Some(vec!["a".into(), "b".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(article.is_read);
        assert_eq!(article.tags, vec!["a", "b"]);

        let StoredValue::Fields(fields) = store.fetch("article:h").await.unwrap() else {
            panic!("expected a hash");
        };
        assert_eq!(fields["read"], "true");
        assert_eq!(fields["tags"], "[\"a\",\"b\"]");
        assert!(!fields.contains_key("isRead"));
    }

    #[tokio::test]
    async fn test_update_json_record() {
        let store = MemoryStore::new();
        store.insert_text("newsletter:j", json!({"title": "Json", "isArchived": false}).to_string());
        let settings = ResolverConfig::default();

        let article = Resolver::new(&store, &settings)
            .update_flags(
                Some("j"),
                ArticlePatch {
                    is_archived: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(article.is_archived);

        let StoredValue::Text(text) = store.fetch("newsletter:j").await.unwrap() else {
            panic!("expected a string");
        };
        let stored: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(stored["isArchived"], json!(true));
        assert_eq!(stored["title"], json!("Json"));
    }

    #[tokio::test]
    async fn test_empty_patch_rejected() {
        let store = MemoryStore::new();
        let settings = ResolverConfig::default();
        let err = Resolver::new(&store, &settings)
            .update_flags(Some("x"), ArticlePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.insert_text("x", json!({"title": "Raw"}).to_string());
        let settings = ResolverConfig::default();
        let resolver = Resolver::new(&store, &settings);

        resolver.delete(Some("x")).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(resolver.delete(Some("x")).await, Err(ResolveError::NotFound(_))));
    }
}
