//! Core traits for dossier abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ORDER REPOSITORY
// =============================================================================

/// Request for creating a new purchase order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub reference: String,
    pub partner_id: Option<Uuid>,
}

/// Request for listing purchase orders.
#[derive(Debug, Clone, Default)]
pub struct ListOrdersRequest {
    /// Maximum results (clamped to `defaults::PAGE_LIMIT_MAX`).
    pub limit: Option<i64>,
    /// Pagination offset.
    pub offset: Option<i64>,
    /// Filter by partner.
    pub partner_id: Option<Uuid>,
}

/// Response for listing purchase orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<OrderSummary>,
    pub total: i64,
}

/// Repository for purchase order CRUD plus the two derived merged-artifact
/// columns.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order.
    async fn insert(&self, req: CreateOrderRequest) -> Result<Uuid>;

    /// Fetch an order by ID.
    async fn fetch(&self, id: Uuid) -> Result<PurchaseOrder>;

    /// List orders with pagination and attachment counts.
    async fn list(&self, req: ListOrdersRequest) -> Result<ListOrdersResponse>;

    /// Delete an order (cascades to its attachments).
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Check if an order exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;

    /// Fetch the stored merged artifact, if any.
    async fn fetch_merged_document(&self, id: Uuid) -> Result<Option<MergedArtifact>>;

    /// Write (or clear, with `None`) the two derived merged-artifact columns.
    /// Never touches the attachment set.
    async fn set_merged_document(&self, id: Uuid, artifact: Option<&MergedArtifact>) -> Result<()>;

    /// IDs of all orders referencing a partner, for invalidation fan-out.
    async fn list_ids_for_partner(&self, partner_id: Uuid) -> Result<Vec<Uuid>>;
}

// =============================================================================
// ATTACHMENT REPOSITORY
// =============================================================================

/// Request for creating an attachment.
#[derive(Debug, Clone)]
pub struct CreateAttachmentRequest {
    pub owner: AttachmentOwner,
    pub filename: String,
    pub content_type: String,
    /// Payload exactly as received in transit (normally base64 text).
    pub payload: Vec<u8>,
    /// Decoded payload size in bytes.
    pub size_bytes: i64,
    pub origin: AttachmentOrigin,
}

/// Repository for binary document attachments.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Insert a new attachment, appending it to the owner's display order.
    async fn insert(&self, req: CreateAttachmentRequest) -> Result<Attachment>;

    /// Fetch a full attachment (with payload) by ID.
    async fn fetch(&self, id: Uuid) -> Result<Attachment>;

    /// List attachment summaries for an owner, in attachment order
    /// (`display_order`, then `created_at`).
    async fn list_for_owner(&self, owner: &AttachmentOwner) -> Result<Vec<AttachmentSummary>>;

    /// Fetch full attachments (with payloads) for an owner, restricted to
    /// the given origin, in attachment order. This is the merge routine's
    /// read path.
    async fn fetch_for_owner(
        &self,
        owner: &AttachmentOwner,
        origin: AttachmentOrigin,
    ) -> Result<Vec<Attachment>>;

    /// Delete an attachment. The owner record is untouched.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Count attachments for an owner.
    async fn count_for_owner(&self, owner: &AttachmentOwner) -> Result<i64>;
}

// =============================================================================
// PARTNER REPOSITORY
// =============================================================================

/// Request for creating a partner.
#[derive(Debug, Clone)]
pub struct CreatePartnerRequest {
    pub name: String,
    pub email: Option<String>,
}

/// Repository for business partners.
#[async_trait]
pub trait PartnerRepository: Send + Sync {
    /// Insert a new partner.
    async fn insert(&self, req: CreatePartnerRequest) -> Result<Uuid>;

    /// Fetch a partner by ID.
    async fn fetch(&self, id: Uuid) -> Result<Partner>;

    /// Check if a partner exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;

    /// Delete a partner. Orders referencing it keep their merged artifact;
    /// the foreign key is set null by the schema.
    async fn delete(&self, id: Uuid) -> Result<()>;
}
