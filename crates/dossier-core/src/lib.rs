//! # dossier-core
//!
//! Core types, traits, and the attachment-merge routine for dossier.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other dossier crates depend on, plus the pure
//! merge computation that keeps a purchase order's merged PDF artifact
//! consistent with its attachment set.

pub mod content_type;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod merge;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use content_type::resolve_content_type;
pub use error::{Error, Result};
pub use merge::{compute_merged_artifact, decode_transit_payload, merge_documents, SourceDocument};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
