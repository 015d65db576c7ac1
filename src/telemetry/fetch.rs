//! Fetching JSON documents from the node API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{FetchError, SetupError};

/// Fetches a JSON document from a URL.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Whether a fetched document counts as a "ready" answer.
///
/// `null`, `{}` and `[]` are what a half-started node API returns, so they
/// are treated the same as no answer at all.
pub fn is_ready_document(doc: &Value) -> bool {
    match doc {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// [`JsonFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpJsonFetcher {
    client: Client,
}

impl HttpJsonFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SetupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SetupError::HttpClient {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for HttpJsonFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;

    use super::*;

    async fn start_server() -> SocketAddr {
        let app = Router::new()
            .route(
                "/_node/stats",
                get(|| async { axum::Json(json!({"pipeline": {"events": {"in": 3}}})) }),
            )
            .route("/broken", get(|| async { "not json" }))
            .route(
                "/starting",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "starting") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher() -> HttpJsonFetcher {
        HttpJsonFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_json_document() {
        let addr = start_server().await;
        let doc = fetcher()
            .fetch_json(&format!("http://{}/_node/stats", addr))
            .await
            .unwrap();
        assert_eq!(doc["pipeline"]["events"]["in"], 3);
    }

    #[tokio::test]
    async fn test_fetch_non_json_body() {
        let addr = start_server().await;
        let err = fetcher()
            .fetch_json(&format!("http://{}/broken", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }), "got: {:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let addr = start_server().await;
        let err = fetcher()
            .fetch_json(&format!("http://{}/starting", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher()
            .fetch_json(&format!("http://{}/_node/stats", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[test]
    fn test_ready_documents() {
        assert!(!is_ready_document(&Value::Null));
        assert!(!is_ready_document(&json!({})));
        assert!(!is_ready_document(&json!([])));
        assert!(is_ready_document(&json!({"status": "green"})));
        assert!(is_ready_document(&json!("up")));
    }
}
