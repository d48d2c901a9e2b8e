//! Purchase order repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use dossier_core::{
    defaults, new_v7, CreateOrderRequest, Error, ListOrdersRequest, ListOrdersResponse,
    MergedArtifact, OrderRepository, OrderSummary, PurchaseOrder, Result,
};

/// PostgreSQL implementation of OrderRepository.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new PgOrderRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<PurchaseOrder> {
    Ok(PurchaseOrder {
        id: row.try_get("id")?,
        reference: row.try_get("reference")?,
        partner_id: row.try_get("partner_id")?,
        merged_document_name: row.try_get("merged_document_name")?,
        has_merged_document: row.try_get("has_merged_document")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, req: CreateOrderRequest) -> Result<Uuid> {
        if req.reference.trim().is_empty() {
            return Err(Error::InvalidInput("Order reference must not be empty".into()));
        }

        let id = new_v7();
        sqlx::query(
            r#"INSERT INTO purchase_order (id, reference, partner_id)
               VALUES ($1, $2, $3)"#,
        )
        .bind(id)
        .bind(req.reference.trim())
        .bind(req.partner_id)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<PurchaseOrder> {
        let row = sqlx::query(
            r#"SELECT id, reference, partner_id, merged_document_name,
                      (merged_document IS NOT NULL) AS has_merged_document,
                      created_at, updated_at
               FROM purchase_order WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::OrderNotFound(id))?;

        order_from_row(&row)
    }

    async fn list(&self, req: ListOrdersRequest) -> Result<ListOrdersResponse> {
        let limit = req
            .limit
            .unwrap_or(defaults::PAGE_LIMIT)
            .clamp(1, defaults::PAGE_LIMIT_MAX);
        let offset = req.offset.unwrap_or(0).max(0);

        let rows = sqlx::query(
            r#"SELECT o.id, o.reference, o.partner_id, o.merged_document_name,
                      o.created_at, o.updated_at,
                      (SELECT COUNT(*) FROM attachment a
                       WHERE a.owner_kind = 'purchase_order' AND a.owner_id = o.id)
                          AS attachment_count
               FROM purchase_order o
               WHERE ($3::uuid IS NULL OR o.partner_id = $3)
               ORDER BY o.created_at DESC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .bind(req.partner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(OrderSummary {
                id: row.try_get("id")?,
                reference: row.try_get("reference")?,
                partner_id: row.try_get("partner_id")?,
                attachment_count: row.try_get("attachment_count")?,
                merged_document_name: row.try_get("merged_document_name")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            });
        }

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM purchase_order o
               WHERE ($1::uuid IS NULL OR o.partner_id = $1)"#,
        )
        .bind(req.partner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ListOrdersResponse { orders, total })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Attachment ownership is polymorphic, so the cascade is explicit.
        sqlx::query(
            r#"DELETE FROM attachment
               WHERE owner_kind = 'purchase_order' AND owner_id = $1"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM purchase_order WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::OrderNotFound(id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM purchase_order WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn fetch_merged_document(&self, id: Uuid) -> Result<Option<MergedArtifact>> {
        let row = sqlx::query(
            r#"SELECT merged_document, merged_document_name
               FROM purchase_order WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::OrderNotFound(id))?;

        let data: Option<Vec<u8>> = row.try_get("merged_document")?;
        let filename: Option<String> = row.try_get("merged_document_name")?;
        match (data, filename) {
            (Some(data), Some(filename)) => Ok(Some(MergedArtifact { data, filename })),
            _ => Ok(None),
        }
    }

    async fn set_merged_document(&self, id: Uuid, artifact: Option<&MergedArtifact>) -> Result<()> {
        let (data, filename) = match artifact {
            Some(artifact) => (Some(artifact.data.as_slice()), Some(artifact.filename.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"UPDATE purchase_order
               SET merged_document = $2, merged_document_name = $3, updated_at = now()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(data)
        .bind(filename)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::OrderNotFound(id));
        }
        Ok(())
    }

    async fn list_ids_for_partner(&self, partner_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"SELECT id FROM purchase_order
               WHERE partner_id = $1
               ORDER BY created_at"#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
