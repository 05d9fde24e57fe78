//! Remote key-value mirror
//!
//! The mirror is an external service reached through two best-effort calls.
//! Failures never propagate: a failed save means "not synced this time", a
//! failed load means "no remote data".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Save/load contract of the remote mirror. Implementations are scoped to one
/// installation.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Store `value` under `key`. Returns whether the mirror accepted it.
    async fn save(&self, key: &str, value: &str) -> bool;

    /// Fetch the value under `key`, `None` when absent or unreachable.
    async fn load(&self, key: &str) -> Option<String>;
}

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// HTTP mirror client
///
/// ```text
/// POST {base}/save            {"uid": .., "key": .., "value": ".."}
/// GET  {base}/get?uid=..&key=..   -> {"value": ".." | null}
/// ```
pub struct HttpMirror {
    client: Client,
    base_url: String,
    uid: String,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    uid: &'a str,
    key: &'a str,
    value: &'a str,
}

impl HttpMirror {
    /// Create a new mirror client for installation `uid`
    pub fn new(base_url: &str, uid: String, timeout: Duration) -> Result<Self, MirrorError> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        // Validate URL
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(MirrorError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            uid,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn try_save(&self, key: &str, value: &str) -> Result<(), MirrorError> {
        let response = self
            .client
            .post(self.url("save"))
            .json(&SaveRequest {
                uid: &self.uid,
                key,
                value,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn try_load(&self, key: &str) -> Result<Option<String>, MirrorError> {
        let response = self
            .client
            .get(self.url("get"))
            .query(&[("uid", self.uid.as_str()), ("key", key)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(MirrorError::Server {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            _ => {}
        }

        let body: serde_json::Value = response.json().await?;
        Ok(extract_value(&body))
    }
}

/// Pull the `value` field out of a load response. A string is returned as is,
/// any other non-null JSON is re-serialized.
fn extract_value(body: &serde_json::Value) -> Option<String> {
    match body.get("value") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

#[async_trait]
impl RemoteMirror for HttpMirror {
    async fn save(&self, key: &str, value: &str) -> bool {
        match self.try_save(key, value).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Mirror save of {:?} failed: {}", key, e);
                false
            }
        }
    }

    async fn load(&self, key: &str) -> Option<String> {
        match self.try_load(key).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Mirror load of {:?} failed: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_http_urls() {
        let result = HttpMirror::new("ftp://mirror", "u_1".into(), Duration::from_secs(1));
        assert!(matches!(result, Err(MirrorError::InvalidUrl(_))));
    }

    #[test]
    fn test_url_building() {
        let mirror =
            HttpMirror::new("https://mirror.example/ ", "u_1".into(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(mirror.url("save"), "https://mirror.example/save");
        assert_eq!(mirror.url("/get"), "https://mirror.example/get");
        assert_eq!(mirror.uid(), "u_1");
    }

    #[test]
    fn test_extract_value() {
        assert_eq!(extract_value(&json!({"value": "[1,2]"})), Some("[1,2]".into()));
        assert_eq!(extract_value(&json!({"value": [1, 2]})), Some("[1,2]".into()));
        assert_eq!(extract_value(&json!({"value": null})), None);
        assert_eq!(extract_value(&json!({})), None);
    }

    #[tokio::test]
    async fn test_unreachable_mirror_is_not_fatal() {
        // Port 9 (discard) on localhost is closed in test environments
        let mirror =
            HttpMirror::new("http://127.0.0.1:9", "u_1".into(), Duration::from_secs(1)).unwrap();
        assert!(!mirror.save("ll_srs_v1", "[]").await);
        assert_eq!(mirror.load("ll_srs_v1").await, None);
    }
}
