//! Journal persistence collaborator.
//!
//! The editor talks to [`JournalStore`]; [`JournalApi`] is the HTTP
//! implementation backed by the journal service.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::settings::AppSettings;

use super::errors::JournalError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stored journal as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Raw caption payload; shape varies by transcription provider.
    #[serde(default)]
    pub caption: Option<Value>,
    #[serde(default)]
    pub video_timestamp: Option<f64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl JournalRecord {
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateJournal {
    pub content: String,
    /// Whole seconds into the video at save time.
    pub video_timestamp: u64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

pub trait JournalStore: Send + Sync {
    fn get_journal(&self, id: &str) -> impl Future<Output = Result<JournalRecord, JournalError>> + Send;

    fn update_journal(
        &self,
        id: &str,
        update: &UpdateJournal,
    ) -> impl Future<Output = Result<JournalRecord, JournalError>> + Send;

    /// Asks the service to re-derive captions. Callers re-fetch the record afterwards.
    fn refresh_transcript(&self, id: &str) -> impl Future<Output = Result<(), JournalError>> + Send;
}

/// HTTP client for the journal service.
#[derive(Debug, Clone)]
pub struct JournalApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl JournalApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, JournalError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| JournalError::persistence(0, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self, JournalError> {
        Self::new(settings.api_base_url.clone(), settings.api_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, JournalError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            tracing::error!(target: "recorder", "[API] Request failed: {}", e);
            JournalError::persistence(0, e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<Value>().await.ok();
        let message = error_message_from_body(status.as_u16(), body.as_ref());
        tracing::warn!(target: "recorder", "[API] {} returned: {}", status, message);
        Err(JournalError::persistence(status.as_u16(), message))
    }

    async fn read_record(response: reqwest::Response) -> Result<JournalRecord, JournalError> {
        let status = response.status().as_u16();
        response
            .json::<JournalRecord>()
            .await
            .map_err(|e| JournalError::persistence(status, format!("Failed to parse journal: {}", e)))
    }
}

impl JournalStore for JournalApi {
    async fn get_journal(&self, id: &str) -> Result<JournalRecord, JournalError> {
        tracing::debug!(target: "recorder", "[API] GET journal {}", id);
        let response = self.send(self.client.get(self.url(&format!("/journals/{}", id)))).await?;
        Self::read_record(response).await
    }

    async fn update_journal(&self, id: &str, update: &UpdateJournal) -> Result<JournalRecord, JournalError> {
        tracing::debug!(target: "recorder",
            "[API] PUT journal {} ({} chars, t={}s)", id, update.content.len(), update.video_timestamp);
        let request = self
            .client
            .put(self.url(&format!("/journals/{}", id)))
            .json(update);
        let response = self.send(request).await?;
        Self::read_record(response).await
    }

    async fn refresh_transcript(&self, id: &str) -> Result<(), JournalError> {
        tracing::info!(target: "transcript", "[API] Refreshing transcript for journal {}", id);
        self.send(
            self.client
                .post(self.url(&format!("/journals/{}/refresh-transcript", id))),
        )
        .await?;
        Ok(())
    }
}

/// `message`, else `error`, else a generic status line. An unreadable body
/// reports "Request failed".
pub fn error_message_from_body(status: u16, body: Option<&Value>) -> String {
    let Some(body) = body else {
        return "Request failed".to_string();
    };

    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_precedence() {
        let both = json!({"message": "bad content", "error": "Bad Request"});
        assert_eq!(error_message_from_body(400, Some(&both)), "bad content");

        let error_only = json!({"error": "Not Found"});
        assert_eq!(error_message_from_body(404, Some(&error_only)), "Not Found");

        let neither = json!({"detail": "x", "message": ""});
        assert_eq!(error_message_from_body(500, Some(&neither)), "HTTP error! status: 500");

        assert_eq!(error_message_from_body(502, None), "Request failed");
    }

    #[test]
    fn test_record_accepts_numeric_id_and_missing_fields() {
        let record: JournalRecord = serde_json::from_value(json!({
            "id": 42,
            "title": "Monday",
            "caption": {"segments": []}
        }))
        .unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.content(), "");
        assert!(record.caption.is_some());
        assert_eq!(record.video_url, None);
    }

    #[test]
    fn test_update_payload_shape() {
        let update = UpdateJournal {
            content: "<p>notes</p>".into(),
            video_timestamp: 12,
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"content": "<p>notes</p>", "video_timestamp": 12})
        );
    }

    #[test]
    fn test_api_trims_trailing_slash_and_blank_token() {
        let api = JournalApi::new("http://localhost:6020/", Some(String::new())).unwrap();
        assert_eq!(api.base_url(), "http://localhost:6020");
        assert_eq!(api.url("/journals/1"), "http://localhost:6020/journals/1");
        assert!(api.token.is_none());
    }
}
