//! libSQL page store.
//!
//! The [`PageStore`] struct wraps a libSQL database holding the generated
//! documentation pages and per-deployment prompt template overrides. The
//! HTTP server is the sole writer.

mod migrations;

use std::path::Path;

use chrono::Utc;
use docsmith_shared::{DocsmithError, PageDetails, PageId, PageRecord, PageSummary, Result};
use libsql::{Connection, Database, params};
use tracing::debug;

/// Title used when detail extraction came back empty.
const FALLBACK_TITLE: &str = "Untitled Page";

/// Primary storage handle wrapping a libSQL database.
pub struct PageStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl PageStore {
    /// Open or create a database at `path` and run pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DocsmithError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Get a page by id.
    pub async fn find_page(&self, id: &str) -> Result<Option<PageRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, page_title, description, html_code, created_at
                 FROM pages WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_page(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DocsmithError::Storage(e.to_string())),
        }
    }

    /// Replace a page's HTML, inserting the row if it does not exist.
    ///
    /// The insert arm covers drift between the similarity index and the
    /// store: an id the index knows but the store lost gets a fresh row with
    /// an empty title. An existing row keeps its title, description and
    /// `created_at`; only `html_code` is replaced.
    pub async fn upsert_html(&self, id: &str, html: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO pages (id, page_title, description, html_code, created_at)
                 VALUES (?1, '', NULL, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET html_code = excluded.html_code",
                params![id, html, now.as_str()],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Insert a brand-new page and return the stored record.
    ///
    /// Mints a UUID v7 id. A missing extracted title falls back to
    /// "Untitled Page"; a title already taken by another page gets the
    /// current Unix-millisecond timestamp appended instead of failing the
    /// write.
    pub async fn create_page(&self, details: &PageDetails, html: &str) -> Result<PageRecord> {
        let id = PageId::new().to_string();
        let requested = details
            .page_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(FALLBACK_TITLE);
        let title = self.dedupe_title(requested).await?;
        let now = Utc::now();

        self.conn
            .execute(
                "INSERT INTO pages (id, page_title, description, html_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    title.as_str(),
                    details.description.as_deref(),
                    html,
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        debug!(page_id = %id, title = %title, "page created");
        Ok(PageRecord {
            id,
            page_title: title,
            description: details.description.clone(),
            html_code: html.to_owned(),
            created_at: now,
        })
    }

    /// Append a millisecond timestamp when the title is already taken.
    async fn dedupe_title(&self, requested: &str) -> Result<String> {
        if self.title_exists(requested).await? {
            let suffixed = format!("{requested}-{}", Utc::now().timestamp_millis());
            debug!(requested, suffixed = %suffixed, "title collision, suffixing");
            return Ok(suffixed);
        }
        Ok(requested.to_owned())
    }

    async fn title_exists(&self, title: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM pages WHERE page_title = ?1 LIMIT 1",
                params![title],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DocsmithError::Storage(e.to_string())),
        }
    }

    /// Count stored pages.
    pub async fn count_pages(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pages", params![])
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as u64)
                .map_err(|e| DocsmithError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(DocsmithError::Storage(e.to_string())),
        }
    }

    /// List all pages, newest first, without their HTML bodies.
    pub async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, page_title, created_at FROM pages ORDER BY created_at DESC",
                params![],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(PageSummary {
                id: row
                    .get::<String>(0)
                    .map_err(|e| DocsmithError::Storage(e.to_string()))?,
                page_title: row
                    .get::<String>(1)
                    .map_err(|e| DocsmithError::Storage(e.to_string()))?,
                created_at: {
                    let s: String = row
                        .get(2)
                        .map_err(|e| DocsmithError::Storage(e.to_string()))?;
                    parse_timestamp(&s)?
                },
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Prompt template overrides
    // -----------------------------------------------------------------------

    /// Get the stored template override for a workflow kind, if any.
    pub async fn prompt_override(&self, kind: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT template FROM prompt_overrides WHERE kind = ?1",
                params![kind],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let template: String = row
                    .get(0)
                    .map_err(|e| DocsmithError::Storage(e.to_string()))?;
                Ok(Some(template))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DocsmithError::Storage(e.to_string())),
        }
    }

    /// Store a template override for a workflow kind (upserts).
    pub async fn set_prompt_override(&self, kind: &str, template: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO prompt_overrides (kind, template, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(kind) DO UPDATE SET
                   template = excluded.template,
                   updated_at = excluded.updated_at",
                params![kind, template, now.as_str()],
            )
            .await
            .map_err(|e| DocsmithError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Convert a database row to a [`PageRecord`].
fn row_to_page(row: &libsql::Row) -> Result<PageRecord> {
    Ok(PageRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| DocsmithError::Storage(e.to_string()))?,
        page_title: row
            .get::<String>(1)
            .map_err(|e| DocsmithError::Storage(e.to_string()))?,
        description: row.get::<String>(2).ok(),
        html_code: row
            .get::<String>(3)
            .map_err(|e| DocsmithError::Storage(e.to_string()))?,
        created_at: {
            let s: String = row
                .get(4)
                .map_err(|e| DocsmithError::Storage(e.to_string()))?;
            parse_timestamp(&s)?
        },
    })
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DocsmithError::Storage(format!("invalid date: {e}")))
}
