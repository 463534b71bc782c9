//! Core domain types for Docsmith pages and document identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PageId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for page identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

impl PageId {
    /// Mint a new time-sortable page identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// PageRecord
// ---------------------------------------------------------------------------

/// A generated documentation page, one row per logical page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Unique page identifier, minted once on creation.
    pub id: String,
    /// Display title. Unique among pages; collisions are corrected with a
    /// timestamp suffix rather than rejected.
    pub page_title: String,
    /// Extracted metadata, populated on first creation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The full HTML body. Replaced wholesale on update, never merged.
    pub html_code: String,
    /// Set on first insert and never touched again.
    pub created_at: DateTime<Utc>,
}

/// Listing projection for the serving surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub id: String,
    pub page_title: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PageDetails
// ---------------------------------------------------------------------------

/// Metadata extracted from a PRD for a newly created page.
///
/// Both fields are optional; the extraction backend is allowed to come back
/// empty and the page store substitutes a fallback title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetails {
    #[serde(default, alias = "pageTitle")]
    pub page_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// DocumentMatch
// ---------------------------------------------------------------------------

/// Best candidate returned by the similarity index for a PRD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMatch {
    /// Opaque identity of the matched document.
    pub document_id: String,
    /// Vector distance of the candidate. Smaller is closer.
    pub distance: f64,
    /// The canonical text stored under this identity.
    #[serde(default)]
    pub document: String,
}

// ---------------------------------------------------------------------------
// Process request
// ---------------------------------------------------------------------------

/// An image supplied with a request, passed to the prompt as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub url: String,
}

/// Body of a `process-docs` request.
///
/// `prd` defaults to empty so a missing field surfaces as an input-validation
/// error instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub prd: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Which branch the pipeline took for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// No similar document existed; a page was minted.
    Create,
    /// The request matched an existing document; its page was replaced.
    Update,
}

impl Workflow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_id_roundtrip() {
        let id = PageId::new();
        let s = id.to_string();
        let parsed: PageId = s.parse().expect("parse PageId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn page_details_accepts_camel_case() {
        let details: PageDetails =
            serde_json::from_str(r#"{"pageTitle": "Setup Guide", "description": "How to set up"}"#)
                .expect("deserialize");
        assert_eq!(details.page_title.as_deref(), Some("Setup Guide"));
        assert_eq!(details.description.as_deref(), Some("How to set up"));
    }

    #[test]
    fn page_details_defaults_when_fields_absent() {
        let details: PageDetails = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(details, PageDetails::default());
        assert!(details.page_title.is_none());
    }

    #[test]
    fn document_match_deserializes() {
        let json = r#"{"document_id": "doc-1", "distance": 0.12, "document": "prior text"}"#;
        let m: DocumentMatch = serde_json::from_str(json).expect("deserialize");
        assert_eq!(m.document_id, "doc-1");
        assert!(m.distance < 0.5);
        assert_eq!(m.document, "prior text");
    }

    #[test]
    fn process_request_defaults_missing_fields() {
        let req: ProcessRequest = serde_json::from_str("{}").expect("deserialize");
        assert!(req.prd.is_empty());
        assert!(req.images.is_empty());

        let req: ProcessRequest = serde_json::from_str(
            r#"{"prd": "Build a widget", "images": [{"name": "logo", "url": "https://example.com/logo.png"}]}"#,
        )
        .expect("deserialize");
        assert_eq!(req.prd, "Build a widget");
        assert_eq!(req.images.len(), 1);
        assert_eq!(req.images[0].name, "logo");
    }

    #[test]
    fn workflow_storage_keys() {
        assert_eq!(Workflow::Create.as_str(), "create");
        assert_eq!(Workflow::Update.as_str(), "update");
    }
}
