//! Core pipeline orchestration and domain logic for Docsmith.
//!
//! This crate ties together text normalization, identity resolution,
//! prompt assembly, generation and persistence into the end-to-end
//! `process` workflow.

pub mod locks;
pub mod pipeline;

pub use pipeline::{Pipeline, ProcessOutcome};
