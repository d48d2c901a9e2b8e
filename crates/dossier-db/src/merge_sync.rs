//! Merge synchronization service.
//!
//! Keeps the derived merged artifact on a purchase order consistent with
//! the order's current attachment set. The computation itself is the pure
//! `dossier_core::merge` routine; this service owns the read and write
//! paths around it and the trigger policy:
//!
//! - `sync_order` surfaces merge failures as recoverable errors and leaves
//!   the previously stored artifact untouched;
//! - write-path triggers (`attachment_changed`) log those failures at
//!   ERROR and never fail the triggering write;
//! - partner document changes fan out to every referencing order
//!   (explicit invalidation propagation, no implicit cascades).

use std::time::Instant;

use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use dossier_core::{
    compute_merged_artifact, defaults, AttachmentOrigin, AttachmentOwner, AttachmentOwnerKind,
    AttachmentRepository, Error, OrderRepository, Result, SourceDocument,
};

use crate::attachments::PgAttachmentRepository;
use crate::orders::PgOrderRepository;

/// What a sync call did to the stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Stored artifact already matched the attachment set; nothing written.
    Unchanged,
    /// No qualifying attachment; both derived fields cleared.
    Cleared,
    /// Exactly one qualifying attachment; payload copied verbatim.
    Single,
    /// Two or more qualifying attachments merged into one document.
    Merged,
}

/// Outcome report of a sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub action: SyncAction,
    /// Size of the stored artifact after the call, if one exists.
    pub artifact_bytes: Option<usize>,
}

/// Keeps `purchase_order.merged_document` consistent with the order's
/// attachments. Holds no cross-call state.
#[derive(Clone)]
pub struct MergeSynchronizer {
    orders: PgOrderRepository,
    attachments: PgAttachmentRepository,
}

impl MergeSynchronizer {
    /// Create a new synchronizer over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            orders: PgOrderRepository::new(pool.clone()),
            attachments: PgAttachmentRepository::new(pool),
        }
    }

    /// Reconcile the merged artifact with the order's current attachment
    /// set. Idempotent: a second call with no attachment change reports
    /// `Unchanged` and writes nothing.
    ///
    /// # Errors
    ///
    /// `Error::OrderNotFound` when the order does not exist;
    /// `Error::Merge` when the merge library rejects an input document;
    /// in that case the previously stored artifact is left untouched.
    pub async fn sync_order(&self, order_id: Uuid) -> Result<SyncReport> {
        let start = Instant::now();

        if !self.orders.exists(order_id).await? {
            return Err(Error::OrderNotFound(order_id));
        }

        let owner = AttachmentOwner::order(order_id);
        let attachments = self
            .attachments
            .fetch_for_owner(&owner, AttachmentOrigin::User)
            .await?;
        let sources: Vec<SourceDocument> = attachments
            .into_iter()
            .map(|a| SourceDocument {
                content_type: a.content_type,
                payload: a.payload,
            })
            .collect();

        let computed = compute_merged_artifact(&sources)?;
        let current = self.orders.fetch_merged_document(order_id).await?;

        if computed == current {
            debug!(
                subsystem = "merge",
                component = "merge_sync",
                op = "sync_order",
                order_id = %order_id,
                duration_ms = start.elapsed().as_millis() as u64,
                "Merged artifact already up to date"
            );
            return Ok(SyncReport {
                action: SyncAction::Unchanged,
                artifact_bytes: current.map(|a| a.data.len()),
            });
        }

        self.orders
            .set_merged_document(order_id, computed.as_ref())
            .await?;

        let action = match &computed {
            None => SyncAction::Cleared,
            Some(a) if a.filename == defaults::MERGED_SINGLE_NAME => SyncAction::Single,
            Some(_) => SyncAction::Merged,
        };
        let artifact_bytes = computed.as_ref().map(|a| a.data.len());

        info!(
            subsystem = "merge",
            component = "merge_sync",
            op = "sync_order",
            order_id = %order_id,
            action = ?action,
            payload_len = artifact_bytes.unwrap_or(0),
            duration_ms = start.elapsed().as_millis() as u64,
            "Merged artifact updated"
        );

        Ok(SyncReport {
            action,
            artifact_bytes,
        })
    }

    /// Invalidation fan-out: re-sync every order referencing a partner.
    ///
    /// Per-order failures are logged and skipped; the call only fails when
    /// the dependent orders cannot be enumerated. Returns the number of
    /// orders synced.
    pub async fn resync_orders_for_partner(&self, partner_id: Uuid) -> Result<usize> {
        let order_ids = self.orders.list_ids_for_partner(partner_id).await?;
        let mut synced = 0;

        for order_id in &order_ids {
            match self.sync_order(*order_id).await {
                Ok(_) => synced += 1,
                Err(e) => error!(
                    subsystem = "merge",
                    component = "merge_sync",
                    op = "resync_partner",
                    partner_id = %partner_id,
                    order_id = %order_id,
                    error = %e,
                    "Merge sync failed during partner fan-out"
                ),
            }
        }

        info!(
            subsystem = "merge",
            component = "merge_sync",
            op = "resync_partner",
            partner_id = %partner_id,
            orders_synced = synced,
            "Partner document fan-out complete"
        );
        Ok(synced)
    }

    /// Write-path trigger for attachment create/delete events.
    ///
    /// Routes by the owner's record-type tag, honors the reserved-marker
    /// guard (merge output never re-triggers a sync), and never fails the
    /// triggering write: sync errors are logged at ERROR and swallowed.
    pub async fn attachment_changed(&self, owner: &AttachmentOwner, origin: AttachmentOrigin) {
        if origin == AttachmentOrigin::MergeOutput {
            debug!(
                subsystem = "merge",
                component = "merge_sync",
                op = "attachment_changed",
                owner_id = %owner.id,
                "Merge-output attachment change ignored"
            );
            return;
        }

        let outcome = match owner.kind {
            AttachmentOwnerKind::PurchaseOrder => self.sync_order(owner.id).await.map(|_| ()),
            AttachmentOwnerKind::Partner => {
                self.resync_orders_for_partner(owner.id).await.map(|_| ())
            }
        };

        if let Err(e) = outcome {
            error!(
                subsystem = "merge",
                component = "merge_sync",
                op = "attachment_changed",
                owner_kind = %owner.kind,
                owner_id = %owner.id,
                error = %e,
                "Merge sync failed; keeping previous artifact"
            );
        }
    }
}
