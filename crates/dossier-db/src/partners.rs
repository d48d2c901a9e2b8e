//! Partner repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use dossier_core::{
    new_v7, CreatePartnerRequest, Error, Partner, PartnerRepository, Result,
};

/// PostgreSQL implementation of PartnerRepository.
#[derive(Clone)]
pub struct PgPartnerRepository {
    pool: PgPool,
}

impl PgPartnerRepository {
    /// Create a new PgPartnerRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn partner_from_row(row: &sqlx::postgres::PgRow) -> Result<Partner> {
    Ok(Partner {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PartnerRepository for PgPartnerRepository {
    async fn insert(&self, req: CreatePartnerRequest) -> Result<Uuid> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("Partner name must not be empty".into()));
        }

        let id = new_v7();
        sqlx::query("INSERT INTO partner (id, name, email) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(req.name.trim())
            .bind(req.email)
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Partner> {
        let row = sqlx::query(
            "SELECT id, name, email, created_at, updated_at FROM partner WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::PartnerNotFound(id))?;

        partner_from_row(&row)
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM partner WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r#"DELETE FROM attachment WHERE owner_kind = 'partner' AND owner_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM partner WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::PartnerNotFound(id));
        }

        tx.commit().await?;
        Ok(())
    }
}
