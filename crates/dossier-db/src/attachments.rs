//! Attachment repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use dossier_core::{
    new_v7, Attachment, AttachmentOrigin, AttachmentOwner, AttachmentOwnerKind, AttachmentRepository,
    AttachmentSummary, CreateAttachmentRequest, Error, Result,
};

/// PostgreSQL implementation of AttachmentRepository.
#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    /// Create a new PgAttachmentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn owner_from_row(row: &sqlx::postgres::PgRow) -> Result<AttachmentOwner> {
    let kind: String = row.try_get("owner_kind")?;
    Ok(AttachmentOwner {
        kind: kind.parse::<AttachmentOwnerKind>()?,
        id: row.try_get("owner_id")?,
    })
}

fn attachment_from_row(row: &sqlx::postgres::PgRow) -> Result<Attachment> {
    let origin: String = row.try_get("origin")?;
    Ok(Attachment {
        id: row.try_get("id")?,
        owner: owner_from_row(row)?,
        filename: row.try_get("filename")?,
        content_type: row.try_get("content_type")?,
        payload: row.try_get("payload")?,
        size_bytes: row.try_get("size_bytes")?,
        origin: origin.parse::<AttachmentOrigin>()?,
        display_order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn summary_from_row(row: &sqlx::postgres::PgRow) -> Result<AttachmentSummary> {
    let origin: String = row.try_get("origin")?;
    Ok(AttachmentSummary {
        id: row.try_get("id")?,
        owner: owner_from_row(row)?,
        filename: row.try_get("filename")?,
        content_type: row.try_get("content_type")?,
        size_bytes: row.try_get("size_bytes")?,
        origin: origin.parse::<AttachmentOrigin>()?,
        display_order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn insert(&self, req: CreateAttachmentRequest) -> Result<Attachment> {
        if req.filename.trim().is_empty() {
            return Err(Error::InvalidInput("Attachment filename must not be empty".into()));
        }

        let id = new_v7();
        let row = sqlx::query(
            r#"INSERT INTO attachment
               (id, owner_kind, owner_id, filename, content_type, payload,
                size_bytes, origin, display_order)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                       (SELECT COALESCE(MAX(display_order) + 1, 0) FROM attachment
                        WHERE owner_kind = $2 AND owner_id = $3))
               RETURNING id, owner_kind, owner_id, filename, content_type, payload,
                         size_bytes, origin, display_order, created_at, updated_at"#,
        )
        .bind(id)
        .bind(req.owner.kind.to_string())
        .bind(req.owner.id)
        .bind(req.filename.trim())
        .bind(&req.content_type)
        .bind(&req.payload)
        .bind(req.size_bytes)
        .bind(req.origin.to_string())
        .fetch_one(&self.pool)
        .await?;

        debug!(
            subsystem = "db",
            component = "attachments",
            op = "insert",
            attachment_id = %id,
            owner_kind = %req.owner.kind,
            owner_id = %req.owner.id,
            payload_len = req.size_bytes,
            "Attachment stored"
        );

        attachment_from_row(&row)
    }

    async fn fetch(&self, id: Uuid) -> Result<Attachment> {
        let row = sqlx::query(
            r#"SELECT id, owner_kind, owner_id, filename, content_type, payload,
                      size_bytes, origin, display_order, created_at, updated_at
               FROM attachment WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::AttachmentNotFound(id))?;

        attachment_from_row(&row)
    }

    async fn list_for_owner(&self, owner: &AttachmentOwner) -> Result<Vec<AttachmentSummary>> {
        let rows = sqlx::query(
            r#"SELECT id, owner_kind, owner_id, filename, content_type,
                      size_bytes, origin, display_order, created_at
               FROM attachment
               WHERE owner_kind = $1 AND owner_id = $2
               ORDER BY display_order, created_at"#,
        )
        .bind(owner.kind.to_string())
        .bind(owner.id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn fetch_for_owner(
        &self,
        owner: &AttachmentOwner,
        origin: AttachmentOrigin,
    ) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(
            r#"SELECT id, owner_kind, owner_id, filename, content_type, payload,
                      size_bytes, origin, display_order, created_at, updated_at
               FROM attachment
               WHERE owner_kind = $1 AND owner_id = $2 AND origin = $3
               ORDER BY display_order, created_at"#,
        )
        .bind(owner.kind.to_string())
        .bind(owner.id)
        .bind(origin.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(attachment_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM attachment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }

    async fn count_for_owner(&self, owner: &AttachmentOwner) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attachment WHERE owner_kind = $1 AND owner_id = $2",
        )
        .bind(owner.kind.to_string())
        .bind(owner.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
