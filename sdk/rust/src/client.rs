use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub type SdkResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// An error response from the API.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub body: Value,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API returned {}: {}", self.status, self.body)
    }
}

impl std::error::Error for ApiFailure {}

pub struct NewsletterClient {
    client: Client,
    base_url: String,
}

impl NewsletterClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list(&self, include_archived: bool) -> SdkResult<Vec<ArticleSummary>> {
        let resp = self
            .client
            .get(self.endpoint(&["api", "newsletters"])?)
            .query(&[("includeArchived", include_archived)])
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn get(&self, id: &str) -> SdkResult<Article> {
        let resp = self.client.get(self.newsletter_url(id)?).send().await?;
        decode(resp).await
    }

    /// Create a newsletter from any JSON body the API accepts.
    pub async fn create(&self, body: &Value) -> SdkResult<Article> {
        let resp = self
            .client
            .post(self.endpoint(&["api", "newsletters"])?)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn mark_read(&self, id: &str, read: bool) -> SdkResult<Article> {
        self.patch(id, &serde_json::json!({ "isRead": read })).await
    }

    pub async fn set_archived(&self, id: &str, archived: bool) -> SdkResult<Article> {
        self.patch(id, &serde_json::json!({ "isArchived": archived })).await
    }

    pub async fn patch(&self, id: &str, body: &Value) -> SdkResult<Article> {
        let resp = self
            .client
            .patch(self.newsletter_url(id)?)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete(&self, id: &str) -> SdkResult<()> {
        let resp = self.client.delete(self.newsletter_url(id)?).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(failure(resp).await.into())
        }
    }

    /// Perform a raw GET, for checking status codes and headers.
    pub async fn get_raw(&self, path: &str, bearer: Option<&str>) -> Result<Response, reqwest::Error> {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        req.send().await
    }

    fn newsletter_url(&self, id: &str) -> SdkResult<Url> {
        self.endpoint(&["api", "newsletters", id])
    }

    /// The base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> SdkResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot be used as a base URL", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(resp: Response) -> SdkResult<T> {
    if !resp.status().is_success() {
        return Err(failure(resp).await.into());
    }
    Ok(resp.json::<T>().await?)
}

async fn failure(resp: Response) -> ApiFailure {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    ApiFailure { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_encoded_as_one_segment() {
        let client = NewsletterClient::new("http://localhost:3000/");

        let url = client.newsletter_url("a#b").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/newsletters/a%23b");

        let url = client.newsletter_url("x/y?z").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/newsletters/x%2Fy%3Fz");
    }

    #[test]
    fn test_base_path_is_kept() {
        let client = NewsletterClient::new("http://localhost:3000/reader");
        let url = client.endpoint(&["api", "newsletters"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/reader/api/newsletters");
    }
}
