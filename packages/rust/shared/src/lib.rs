//! Shared types, error model, and configuration for Docsmith.
//!
//! This crate is the foundation depended on by all other Docsmith crates.
//! It provides:
//! - [`DocsmithError`], the unified error type
//! - Domain types ([`PageRecord`], [`PageDetails`], [`DocumentMatch`], [`PageId`])
//! - Configuration ([`AppConfig`], config loading and validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, IndexConfig, ModelConfig, ServerConfig, StorageConfig, config_dir,
    config_file_path, load_config, load_config_from, validate_api_key, validate_endpoints,
};
pub use error::{DocsmithError, Result};
pub use types::{
    DocumentMatch, ImageRef, PageDetails, PageId, PageRecord, PageSummary, ProcessRequest,
    Workflow,
};
