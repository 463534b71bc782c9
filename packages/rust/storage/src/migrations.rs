//! SQL migration definitions for the Docsmith database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: pages, prompt_overrides",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Generated documentation pages
-- Title uniqueness is corrected by the store (timestamp suffixing),
-- not enforced by a schema constraint.
CREATE TABLE IF NOT EXISTS pages (
    id          TEXT PRIMARY KEY,
    page_title  TEXT NOT NULL,
    description TEXT,
    html_code   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_title ON pages(page_title);

-- Per-deployment prompt template overrides
CREATE TABLE IF NOT EXISTS prompt_overrides (
    kind       TEXT PRIMARY KEY,
    template   TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
