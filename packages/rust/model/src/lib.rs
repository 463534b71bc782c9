//! Client for the chat-completion provider.
//!
//! One POST per generation, no retries: a failed completion surfaces the
//! provider's error unchanged and the caller aborts. The fenced-HTML
//! extraction heuristic lives here too, next to the output it interprets.

use std::sync::LazyLock;
use std::time::Duration;

use docsmith_shared::{DocsmithError, ModelConfig, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

/// Fixed system turn sent with every completion request.
const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("docsmith/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Protocol types (mirroring the provider's chat-completion schema)
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

// ---------------------------------------------------------------------------
// ModelClient
// ---------------------------------------------------------------------------

/// HTTP client for the generation provider.
#[derive(Debug, Clone)]
pub struct ModelClient {
    http: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl ModelClient {
    /// Build a client from the provider config and a resolved API key.
    ///
    /// The key value is read from the environment by the caller; config only
    /// names the variable.
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsmithError::Model(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: api_key.into(),
        })
    }

    /// Run one chat completion over the assembled prompt.
    ///
    /// Issues a single request and fails fast: a provider error body, a
    /// non-success status, or a timeout all abort with the provider's message.
    /// Completions are never retried; a retry here would burn tokens on a
    /// generation the caller may already have given up on.
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DocsmithError::Model(format!("completion request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DocsmithError::Model(format!("failed to read completion body: {e}")))?;

        let parsed: ChatResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                if !status.is_success() {
                    return Err(DocsmithError::Model(format!("HTTP {status}: {text}")));
                }
                return Err(DocsmithError::Model(format!(
                    "invalid completion response: {e}"
                )));
            }
        };

        // The provider reports failures in an error body, sometimes under a
        // success status. The body wins over the status line.
        if let Some(reported) = parsed.error.filter(|e| !e.is_null()) {
            let message = reported
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| reported.to_string());
            return Err(DocsmithError::Model(format!("provider error: {message}")));
        }
        if !status.is_success() {
            return Err(DocsmithError::Model(format!("HTTP {status}: {text}")));
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DocsmithError::Model("completion carried no content".into()))?;

        debug!(content_len = content.len(), "completion received");
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// HTML extraction
// ---------------------------------------------------------------------------

/// How the HTML was recovered from a model completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedHtml {
    /// Interior of the first ```html fence in the output.
    Fenced(String),
    /// No fence found; the whole output is taken as HTML.
    Raw(String),
}

impl ExtractedHtml {
    /// The extracted markup, whichever way it was found.
    pub fn into_inner(self) -> String {
        match self {
            Self::Fenced(html) | Self::Raw(html) => html,
        }
    }
}

static HTML_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```html\s*\n(.*?)```").expect("valid regex"));

/// Find the HTML in a free-form model completion.
///
/// Models often wrap the page in explanatory prose plus a ```html fence; when
/// one is present the first fence's interior wins. Without a fence the whole
/// output is taken verbatim. This is a heuristic, not a parser: nothing checks
/// that the result is well-formed markup.
pub fn extract_html(output: &str) -> ExtractedHtml {
    match HTML_FENCE_RE.captures(output) {
        Some(caps) => ExtractedHtml::Fenced(caps[1].trim_end().to_owned()),
        None => ExtractedHtml::Raw(output.to_owned()),
    }
}
