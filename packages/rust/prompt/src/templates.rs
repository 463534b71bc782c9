//! Built-in prompt templates and their selection keys.
//!
//! Templates carry `<key>` placeholders filled by [`crate::render`]. A
//! deployment may override any of them through the page store; these are the
//! fallbacks compiled into the binary.

/// Which prompt template a pipeline stage needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// First-time page generation from a PRD.
    Create,
    /// Regeneration of an existing page against updated requirements.
    Update,
    /// Merge of prior and new requirement text into one canonical summary.
    Combine,
}

impl TemplateKind {
    /// Storage key for template overrides.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Combine => "combine",
        }
    }
}

/// The built-in template for a kind.
pub fn default_template(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::Create => CREATE_TEMPLATE,
        TemplateKind::Update => UPDATE_TEMPLATE,
        TemplateKind::Combine => COMBINE_TEMPLATE,
    }
}

const CREATE_TEMPLATE: &str = r#"You are a technical writer producing product documentation.

Write a complete, well-structured HTML documentation page for the product described in the requirements below. Use semantic HTML with headings, sections, lists, and tables where they help. Return the full page inside a single ```html fenced code block.

Requirements:
<prd>

Available images (JSON array of name/url pairs; reference them where relevant):
<images>
"#;

const UPDATE_TEMPLATE: &str = r#"You are a technical writer maintaining product documentation.

Revise the existing HTML documentation page below so it reflects the updated requirements. Keep structure that still applies, rework the sections the changes touch, and return the complete revised page inside a single ```html fenced code block.

Existing page:
<htmlCode>

Updated requirements:
<prd>

Available images (JSON array of name/url pairs; reference them where relevant):
<images>
"#;

const COMBINE_TEMPLATE: &str = r#"You are consolidating two revisions of a product requirements document.

Merge the two documents below into a single self-contained summary that preserves every requirement from both. Where they conflict, the second document wins. Return plain text only, no markup.

First document:
<prd1>

Second document:
<prd2>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_kinds_have_stable_keys() {
        assert_eq!(TemplateKind::Create.as_str(), "create");
        assert_eq!(TemplateKind::Update.as_str(), "update");
        assert_eq!(TemplateKind::Combine.as_str(), "combine");
    }

    #[test]
    fn create_template_carries_slots() {
        let t = default_template(TemplateKind::Create);
        assert!(t.contains("<prd>"));
        assert!(t.contains("<images>"));
        assert!(!t.contains("<htmlCode>"));
    }

    #[test]
    fn update_template_binds_prior_page() {
        let t = default_template(TemplateKind::Update);
        assert!(t.contains("<htmlCode>"));
        assert!(t.contains("<prd>"));
        assert!(t.contains("<images>"));
    }

    #[test]
    fn combine_template_binds_both_documents() {
        let t = default_template(TemplateKind::Combine);
        assert!(t.contains("<prd1>"));
        assert!(t.contains("<prd2>"));
    }
}
