//! Centralized default constants for the dossier system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// MERGED ARTIFACT
// =============================================================================

/// Display name of the merged artifact when exactly one PDF qualifies.
pub const MERGED_SINGLE_NAME: &str = "document_fusionne.pdf";

/// Display name of the merged artifact when two or more PDFs qualify.
pub const MERGED_MULTI_NAME: &str = "documents_fusionnes.pdf";

/// The only MIME type that qualifies an attachment for merging.
pub const PDF_MIME: &str = "application/pdf";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints (orders, attachments).
pub const PAGE_LIMIT: i64 = 50;

/// Hard ceiling on requested page sizes.
pub const PAGE_LIMIT_MAX: i64 = 500;

// =============================================================================
// UPLOADS
// =============================================================================

/// Default maximum request body size for attachment uploads, in bytes.
/// Base64 transit encoding inflates payloads by ~4/3, so this bounds the
/// encoded body, not the decoded document.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
