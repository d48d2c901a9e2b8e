//! Structured logging schema and field name constants for dossier.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → sync → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "merge"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "merge_sync", "pool", "attachments"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "sync_order", "resync_partner", "upload"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Purchase order UUID being operated on.
pub const ORDER_ID: &str = "order_id";

/// Partner UUID being operated on.
pub const PARTNER_ID: &str = "partner_id";

/// Attachment UUID being operated on.
pub const ATTACHMENT_ID: &str = "attachment_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of qualifying PDF attachments feeding a merge.
pub const QUALIFYING_COUNT: &str = "qualifying_count";

/// Byte length of a payload or merge output.
pub const PAYLOAD_LEN: &str = "payload_len";

/// Number of orders touched by a partner fan-out resync.
pub const ORDERS_SYNCED: &str = "orders_synced";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
