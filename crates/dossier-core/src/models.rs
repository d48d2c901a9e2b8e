//! Core data models for dossier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// PARTNERS
// =============================================================================

/// A business partner (vendor). Partners own document attachments; a write
/// to a partner's document set invalidates the merged artifact of every
/// purchase order referencing the partner.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// PURCHASE ORDERS
// =============================================================================

/// A purchase order: the parent record that owns attachments and the
/// derived merged artifact.
///
/// The merged document payload itself is deliberately absent here: it can
/// be tens of megabytes and never belongs in a JSON response. Fetch it
/// through `OrderRepository::fetch_merged_document`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PurchaseOrder {
    pub id: Uuid,
    /// Human-facing order number, unique.
    pub reference: String,
    pub partner_id: Option<Uuid>,
    /// Display name of the merged artifact, if one exists.
    pub merged_document_name: Option<String>,
    /// Whether a merged artifact is currently stored.
    pub has_merged_document: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row for purchase orders, with the attachment count the order
/// form displays.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub reference: String,
    pub partner_id: Option<Uuid>,
    pub attachment_count: i64,
    pub merged_document_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Record type tag identifying which entity owns an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentOwnerKind {
    PurchaseOrder,
    Partner,
}

impl std::fmt::Display for AttachmentOwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PurchaseOrder => write!(f, "purchase_order"),
            Self::Partner => write!(f, "partner"),
        }
    }
}

impl std::str::FromStr for AttachmentOwnerKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "purchase_order" => Ok(Self::PurchaseOrder),
            "partner" => Ok(Self::Partner),
            other => Err(crate::error::Error::InvalidInput(format!(
                "Unknown attachment owner kind: {}",
                other
            ))),
        }
    }
}

/// Owning record of an attachment: record-type tag plus identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AttachmentOwner {
    pub kind: AttachmentOwnerKind,
    pub id: Uuid,
}

impl AttachmentOwner {
    pub fn order(id: Uuid) -> Self {
        Self {
            kind: AttachmentOwnerKind::PurchaseOrder,
            id,
        }
    }

    pub fn partner(id: Uuid) -> Self {
        Self {
            kind: AttachmentOwnerKind::Partner,
            id,
        }
    }
}

/// Reserved marker distinguishing user uploads from artifacts the merge
/// routine itself writes. Merge output never qualifies for a merge and
/// never re-triggers one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentOrigin {
    #[default]
    User,
    MergeOutput,
}

impl std::fmt::Display for AttachmentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::MergeOutput => write!(f, "merge_output"),
        }
    }
}

impl std::str::FromStr for AttachmentOrigin {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "merge_output" => Ok(Self::MergeOutput),
            other => Err(crate::error::Error::InvalidInput(format!(
                "Unknown attachment origin: {}",
                other
            ))),
        }
    }
}

/// A stored binary document.
///
/// `payload` holds the bytes exactly as they arrived in transit, normally
/// base64 text for JSON uploads. Decoding to raw bytes happens at the point
/// of use (merge, download) via `merge::decode_transit_payload`.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: Uuid,
    pub owner: AttachmentOwner,
    pub filename: String,
    pub content_type: String,
    pub payload: Vec<u8>,
    /// Decoded payload size in bytes.
    pub size_bytes: i64,
    pub origin: AttachmentOrigin,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attachment {
    /// Payload-free view of this attachment.
    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            id: self.id,
            owner: self.owner,
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.size_bytes,
            origin: self.origin,
            display_order: self.display_order,
            created_at: self.created_at,
        }
    }
}

/// Attachment metadata without the payload, for listings and API responses.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AttachmentSummary {
    pub id: Uuid,
    pub owner: AttachmentOwner,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub origin: AttachmentOrigin,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// MERGED ARTIFACT
// =============================================================================

/// The derived merged document: raw PDF bytes plus display name. Not
/// independently persisted; it lives as two nullable columns on the
/// purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    pub data: Vec<u8>,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_kind_roundtrip() {
        for kind in [AttachmentOwnerKind::PurchaseOrder, AttachmentOwnerKind::Partner] {
            let parsed: AttachmentOwnerKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_owner_kind_rejects_unknown() {
        assert!("invoice".parse::<AttachmentOwnerKind>().is_err());
    }

    #[test]
    fn test_origin_roundtrip() {
        for origin in [AttachmentOrigin::User, AttachmentOrigin::MergeOutput] {
            let parsed: AttachmentOrigin = origin.to_string().parse().unwrap();
            assert_eq!(parsed, origin);
        }
    }

    #[test]
    fn test_origin_default_is_user() {
        assert_eq!(AttachmentOrigin::default(), AttachmentOrigin::User);
    }

    #[test]
    fn test_origin_serde_snake_case() {
        let json = serde_json::to_string(&AttachmentOrigin::MergeOutput).unwrap();
        assert_eq!(json, r#""merge_output""#);
    }
}
