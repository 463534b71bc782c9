//! Client for the vector-similarity sidecar.
//!
//! The sidecar owns document identity: given a PRD text it reports the id of
//! the semantically closest stored document and the distance to it. This
//! client wraps the sidecar's RPC endpoints and applies the acceptance
//! threshold that decides between the create and update workflows.

use std::time::Duration;

use docsmith_shared::{DocsmithError, DocumentMatch, IndexConfig, PageDetails, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Exclusive upper bound on the distance of an acceptable match.
///
/// A distance of exactly 0.5 is a miss. Distances below zero never come back
/// from a sane embedding space and are rejected as well.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Attempts for the page-detail extraction call before giving up.
const EXTRACT_ATTEMPTS: u32 = 4;

/// Base delay between extraction attempts; doubles after each failure.
const EXTRACT_BACKOFF: Duration = Duration::from_millis(200);

/// User-Agent string for sidecar requests.
const USER_AGENT: &str = concat!("docsmith/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// IndexClient
// ---------------------------------------------------------------------------

/// HTTP client for the similarity sidecar.
#[derive(Debug, Clone)]
pub struct IndexClient {
    http: Client,
    base_url: String,
}

impl IndexClient {
    /// Build a client from the configured endpoint and timeout.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsmithError::Index(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_owned(),
        })
    }

    /// Look up the closest stored document for `text`.
    ///
    /// Returns `Some` only when the sidecar reports a match with
    /// `0 <= distance < MATCH_THRESHOLD`. A null or out-of-range match is
    /// `None`. Transport and service failures are errors, never `None`:
    /// treating an unreachable sidecar as "no match" would mint a duplicate
    /// page for a document we already track.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn resolve(&self, text: &str) -> Result<Option<DocumentMatch>> {
        let body = self
            .post_json("/retrieve", &serde_json::json!({ "document": text }))
            .await?;

        let Some(top) = body.get("match").filter(|m| !m.is_null()) else {
            debug!("sidecar reported no match");
            return Ok(None);
        };

        let candidate: DocumentMatch = serde_json::from_value(top.clone())
            .map_err(|e| DocsmithError::Index(format!("malformed /retrieve response: {e}")))?;

        if (0.0..MATCH_THRESHOLD).contains(&candidate.distance) {
            debug!(
                document_id = %candidate.document_id,
                distance = candidate.distance,
                "match accepted"
            );
            Ok(Some(candidate))
        } else {
            debug!(distance = candidate.distance, "match outside acceptance window");
            Ok(None)
        }
    }

    /// Store `text` as the canonical content of a document.
    ///
    /// When `document_id` is `None` the sidecar assigns one; the returned id
    /// is the one the entry is stored under either way.
    pub async fn store(&self, document_id: Option<&str>, text: &str) -> Result<String> {
        let mut payload = serde_json::json!({ "document": text });
        if let Some(id) = document_id {
            payload["document_id"] = Value::String(id.to_owned());
        }

        let body = self.post_json("/store", &payload).await?;
        body.get("document_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| document_id.map(str::to_owned))
            .ok_or_else(|| DocsmithError::Index("/store ack missing document_id".into()))
    }

    /// Replace the canonical content of an existing document.
    pub async fn update(&self, document_id: &str, text: &str) -> Result<()> {
        self.post_json(
            "/update",
            &serde_json::json!({ "document_id": document_id, "document": text }),
        )
        .await?;
        Ok(())
    }

    /// Update in place when an id is known, otherwise store fresh.
    pub async fn record_or_update(&self, document_id: Option<&str>, text: &str) -> Result<String> {
        match document_id {
            Some(id) => {
                self.update(id, text).await?;
                Ok(id.to_owned())
            }
            None => self.store(None, text).await,
        }
    }

    /// Ask the sidecar to pull a page title and description out of `text`.
    ///
    /// The extraction endpoint is flaky by nature (it runs a model behind the
    /// scenes and reports transient failures in an `error` field), so this is
    /// the one call that retries: up to [`EXTRACT_ATTEMPTS`] attempts with
    /// doubling backoff. Exhausting the attempts is not fatal; page creation
    /// proceeds with empty details and a fallback title.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn extract_page_details(&self, text: &str) -> Result<PageDetails> {
        for attempt in 1..=EXTRACT_ATTEMPTS {
            match self.try_extract(text).await {
                Ok(details) => return Ok(details),
                Err(e) => {
                    warn!(attempt, error = %e, "page detail extraction failed");
                    if attempt < EXTRACT_ATTEMPTS {
                        tokio::time::sleep(EXTRACT_BACKOFF * 2u32.pow(attempt - 1)).await;
                    }
                }
            }
        }

        debug!("extraction attempts exhausted, continuing with empty details");
        Ok(PageDetails::default())
    }

    async fn try_extract(&self, text: &str) -> Result<PageDetails> {
        let body = self
            .post_json("/extract-page-details", &serde_json::json!({ "prd_text": text }))
            .await?;

        if let Some(reported) = body.get("error").filter(|e| !e.is_null()) {
            let message = match reported {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(DocsmithError::Index(format!(
                "/extract-page-details reported: {message}"
            )));
        }

        let candidate = body.get("data").unwrap_or(&body);
        Ok(parse_details(candidate))
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DocsmithError::Index(format!("POST {path}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DocsmithError::Index(format!("POST {path}: failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(DocsmithError::Index(format!(
                "POST {path}: HTTP {status}: {text}"
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| DocsmithError::Index(format!("POST {path}: invalid JSON response: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Details arrive as a bare object, nested under `data`, or as stringified
/// JSON. Shapes that parse as none of those yield empty details.
fn parse_details(value: &Value) -> PageDetails {
    match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or_default(),
        other => serde_json::from_value(other.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &wiremock::MockServer) -> IndexClient {
        let config = IndexConfig {
            endpoint: server.uri(),
            timeout_secs: 5,
        };
        IndexClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_details_shapes() {
        let direct = serde_json::json!({"page_title": "Reports", "description": "All reports"});
        let parsed = parse_details(&direct);
        assert_eq!(parsed.page_title.as_deref(), Some("Reports"));
        assert_eq!(parsed.description.as_deref(), Some("All reports"));

        let stringified = Value::String(r#"{"pageTitle": "Reports"}"#.into());
        assert_eq!(parse_details(&stringified).page_title.as_deref(), Some("Reports"));

        assert_eq!(parse_details(&Value::Null), PageDetails::default());
    }

    #[tokio::test]
    async fn test_resolve_accepts_close_match() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/retrieve"))
            .and(wiremock::matchers::body_partial_json(
                serde_json::json!({ "document": "feature x adds filtering" }),
            ))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "match": {
                    "document_id": "doc-1",
                    "distance": 0.12,
                    "document": "prior canonical text"
                }
            })))
            .mount(&server)
            .await;

        let found = client_for(&server)
            .resolve("feature x adds filtering")
            .await
            .unwrap()
            .expect("match accepted");

        assert_eq!(found.document_id, "doc-1");
        assert_eq!(found.document, "prior canonical text");
    }

    #[tokio::test]
    async fn test_resolve_rejects_boundary_distance() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/retrieve"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "match": { "document_id": "doc-1", "distance": 0.5 }
            })))
            .mount(&server)
            .await;

        // Exactly at the threshold is a miss, not a match.
        let found = client_for(&server).resolve("text").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_resolve_accepts_just_under_threshold() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/retrieve"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "match": { "document_id": "doc-1", "distance": 0.499 }
            })))
            .mount(&server)
            .await;

        let found = client_for(&server).resolve("text").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_resolve_rejects_negative_distance() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/retrieve"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "match": { "document_id": "doc-1", "distance": -0.2 }
            })))
            .mount(&server)
            .await;

        let found = client_for(&server).resolve("text").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_resolve_null_match_is_none() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/retrieve"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "match": null })),
            )
            .mount(&server)
            .await;

        let found = client_for(&server).resolve("text").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_resolve_service_error_is_error_not_none() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/retrieve"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("index down"))
            .mount(&server)
            .await;

        // An unreachable sidecar must never look like "no match".
        let result = client_for(&server).resolve("text").await;
        assert!(matches!(result, Err(DocsmithError::Index(_))));
    }

    #[tokio::test]
    async fn test_store_echoes_assigned_id() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/store"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "document_id": "fresh-7" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server).store(None, "new document").await.unwrap();
        assert_eq!(id, "fresh-7");
    }

    #[tokio::test]
    async fn test_record_or_update_updates_in_place() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/update"))
            .and(wiremock::matchers::body_partial_json(
                serde_json::json!({ "document_id": "doc-9" }),
            ))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/store"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .record_or_update(Some("doc-9"), "merged text")
            .await
            .unwrap();
        assert_eq!(id, "doc-9");
    }

    #[tokio::test]
    async fn test_extract_page_details_parses_nested_payload() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/extract-page-details"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": null,
                "data": "{\"pageTitle\": \"User Stage Report\", \"description\": \"Stage metrics\"}"
            })))
            .mount(&server)
            .await;

        let details = client_for(&server).extract_page_details("prd").await.unwrap();
        assert_eq!(details.page_title.as_deref(), Some("User Stage Report"));
        assert_eq!(details.description.as_deref(), Some("Stage metrics"));
    }

    #[tokio::test]
    async fn test_extract_page_details_retries_reported_error() {
        let server = wiremock::MockServer::start().await;

        // First call reports a transient error; the retry succeeds.
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/extract-page-details"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "model busy" })),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/extract-page-details"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page_title": "Recovered"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = client_for(&server).extract_page_details("prd").await.unwrap();
        assert_eq!(details.page_title.as_deref(), Some("Recovered"));
    }

    #[tokio::test]
    async fn test_extract_page_details_gives_up_empty() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/extract-page-details"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "extractor down" })),
            )
            .expect(4)
            .mount(&server)
            .await;

        let details = client_for(&server).extract_page_details("prd").await.unwrap();
        assert_eq!(details, PageDetails::default());
    }
}
