//! End-to-end `process-docs` pipeline: PRD → identity → generate → persist → reindex.

use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use docsmith_index::IndexClient;
use docsmith_model::{ExtractedHtml, ModelClient};
use docsmith_prompt::{Binding, TemplateKind};
use docsmith_shared::{DocsmithError, ImageRef, Result, Workflow};
use docsmith_storage::PageStore;

use crate::locks::KeyedLocks;

/// Result of one `process` invocation.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// Id of the created or updated page.
    pub page_id: String,
    /// Identity the similarity index tracks the document under.
    pub document_id: String,
    /// Which branch ran.
    pub workflow: Workflow,
    /// Title of the page after the write.
    pub page_title: String,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// The orchestrator. Owns handles to its collaborators and the per-identity
/// locks; components are injected at construction and live for the process.
pub struct Pipeline {
    store: PageStore,
    index: IndexClient,
    model: ModelClient,
    locks: KeyedLocks,
}

impl Pipeline {
    /// Wire up a pipeline from its collaborators.
    pub fn new(store: PageStore, index: IndexClient, model: ModelClient) -> Self {
        Self {
            store,
            index,
            model,
            locks: KeyedLocks::new(),
        }
    }

    /// Access to the page store for the serving surface.
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Run the full create-or-update flow for one PRD submission.
    ///
    /// 1. Normalize the PRD text
    /// 2. Resolve document identity against the similarity index
    /// 3. Generate HTML via the matching workflow's prompt
    /// 4. Persist: replace in place, or mint a new page
    /// 5. Merge-summarize and reindex the canonical text
    ///
    /// Any stage failure aborts and propagates; committed stages are not
    /// rolled back.
    #[instrument(skip_all, fields(prd_len = prd.len(), images = images.len()))]
    pub async fn process(&self, prd: &str, images: &[ImageRef]) -> Result<ProcessOutcome> {
        let start = Instant::now();

        // --- Phase 1: Normalize ---
        let text = docsmith_text::normalize(prd);
        if text.is_empty() {
            return Err(DocsmithError::invalid_input("PRD is required"));
        }

        let images_binding = Binding::json("images", &images)
            .map_err(|e| DocsmithError::invalid_input(format!("images do not serialize: {e}")))?;

        // --- Phase 2: Resolve identity ---
        // Identical submissions serialize on the content hash before the
        // index is consulted; near-duplicates that hash differently but
        // resolve to the same document serialize on the id key. The order is
        // the same everywhere: content hash first, then document id.
        let _content_guard = self.locks.acquire(&content_hash(&text)).await;

        let matched = self.index.resolve(&text).await?;

        let _identity_guard = match &matched {
            Some(m) => Some(self.locks.acquire(&m.document_id).await),
            None => None,
        };

        let (workflow, prior) = match &matched {
            Some(m) => {
                debug!(document_id = %m.document_id, distance = m.distance, "update workflow");
                let prior = self.store.find_page(&m.document_id).await?;
                if prior.is_none() {
                    warn!(
                        document_id = %m.document_id,
                        "matched document has no stored page, binding empty"
                    );
                }
                (Workflow::Update, prior)
            }
            None => {
                debug!("no similar document, create workflow");
                (Workflow::Create, None)
            }
        };

        // --- Phase 3: Generate ---
        let kind = match workflow {
            Workflow::Create => TemplateKind::Create,
            Workflow::Update => TemplateKind::Update,
        };
        let template = self.template_for(kind).await?;

        let prior_html = prior
            .as_ref()
            .map(|p| p.html_code.clone())
            .unwrap_or_default();
        let prompt = docsmith_prompt::render(
            &template,
            &[
                Binding::new("prd", text.as_str()),
                Binding::new("htmlCode", prior_html),
                images_binding,
            ],
        );

        let output = self.model.complete(&prompt).await?;

        // --- Phase 4: Extract ---
        let html = match docsmith_model::extract_html(&output) {
            ExtractedHtml::Fenced(html) => {
                debug!("fenced HTML block found");
                html
            }
            ExtractedHtml::Raw(html) => {
                debug!("no fenced block, taking raw output");
                html
            }
        };

        // --- Phase 5: Persist ---
        let (page_id, page_title) = match &matched {
            Some(m) => {
                self.store.upsert_html(&m.document_id, &html).await?;
                let title = prior
                    .as_ref()
                    .map(|p| p.page_title.clone())
                    .unwrap_or_default();
                (m.document_id.clone(), title)
            }
            None => {
                // The one point where a new page id is minted.
                let extracted = self.index.extract_page_details(&text).await?;
                let record = self.store.create_page(&extracted, &html).await?;
                (record.id, record.page_title)
            }
        };

        // --- Phase 6: Merge-summarize ---
        // The combined summary overwrites the canonical indexed text so the
        // index stays representative of cumulative content.
        let (prd1, prd2) = match &matched {
            Some(m) => (m.document.as_str(), text.as_str()),
            None => (text.as_str(), ""),
        };
        let combine_template = self.template_for(TemplateKind::Combine).await?;
        let combine_prompt = docsmith_prompt::render(
            &combine_template,
            &[Binding::new("prd1", prd1), Binding::new("prd2", prd2)],
        );
        let merged = self.model.complete(&combine_prompt).await?;

        // --- Phase 7: Reindex ---
        let document_id = match &matched {
            Some(m) => {
                self.index
                    .record_or_update(Some(&m.document_id), &merged)
                    .await?
            }
            None => self.index.store(Some(&page_id), &merged).await?,
        };

        let outcome = ProcessOutcome {
            page_id,
            document_id,
            workflow,
            page_title,
            elapsed: start.elapsed(),
        };

        info!(
            page_id = %outcome.page_id,
            document_id = %outcome.document_id,
            workflow = outcome.workflow.as_str(),
            elapsed_ms = outcome.elapsed.as_millis(),
            "process pipeline complete"
        );

        Ok(outcome)
    }

    /// Stored override for the workflow kind, else the built-in default.
    async fn template_for(&self, kind: TemplateKind) -> Result<String> {
        match self.store.prompt_override(kind.as_str()).await? {
            Some(template) => Ok(template),
            None => Ok(docsmith_prompt::default_template(kind).to_owned()),
        }
    }
}

/// Provisional lock key for a submission: hash of the normalized text.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
