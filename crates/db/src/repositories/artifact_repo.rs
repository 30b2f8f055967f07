//! Repository for the `artifacts` table.
//!
//! Deleted artifacts keep their row (entries may still reference them) but
//! are invisible to every query here.

use archpath_core::artifact::normalize_production_center;
use archpath_core::types::DbId;
use sqlx::PgPool;

use crate::models::artifact::{Artifact, ArtifactListQuery, CreateArtifact, UpdateArtifact};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, production_center, example_location, \
                       image_url, is_active, created_at, updated_at";

/// Provides CRUD operations for catalog artifacts.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Insert a new artifact, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateArtifact) -> Result<Artifact, sqlx::Error> {
        let query = format!(
            "INSERT INTO artifacts (name, description, production_center, example_location, is_active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(input.name.trim())
            .bind(input.description.as_deref().unwrap_or(""))
            .bind(normalize_production_center(input.production_center.as_deref()))
            .bind(&input.example_location)
            .bind(input.is_active.unwrap_or(true))
            .fetch_one(pool)
            .await
    }

    /// Find a non-deleted artifact by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Artifact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM artifacts WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Artifact>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List non-deleted artifacts matching the optional filters, oldest first.
    pub async fn list(
        pool: &PgPool,
        params: &ArtifactListQuery,
    ) -> Result<Vec<Artifact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts
             WHERE deleted_at IS NULL
               AND ($1::BOOLEAN IS NULL OR is_active = $1)
               AND ($2::TEXT IS NULL OR production_center = $2)
               AND ($3::TEXT IS NULL OR name ILIKE '%' || $3 || '%')
             ORDER BY id ASC"
        );
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        sqlx::query_as::<_, Artifact>(&query)
            .bind(params.is_active)
            .bind(&params.production_center)
            .bind(search)
            .fetch_all(pool)
            .await
    }

    /// Update an artifact. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no live row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateArtifact,
    ) -> Result<Option<Artifact>, sqlx::Error> {
        let query = format!(
            "UPDATE artifacts SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                production_center = COALESCE($4, production_center),
                example_location = COALESCE($5, example_location),
                is_active = COALESCE($6, is_active)
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        let center = input
            .production_center
            .as_deref()
            .map(|c| normalize_production_center(Some(c)));
        sqlx::query_as::<_, Artifact>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(center)
            .bind(&input.example_location)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Store the public URL of the artifact's uploaded image.
    pub async fn set_image_url(
        pool: &PgPool,
        id: DbId,
        image_url: &str,
    ) -> Result<Option<Artifact>, sqlx::Error> {
        let query = format!(
            "UPDATE artifacts SET image_url = $2
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(id)
            .bind(image_url)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete an artifact and take it out of the active catalog.
    ///
    /// Returns `true` if the row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE artifacts SET deleted_at = NOW(), is_active = false
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert an artifact unless a live one with the same name exists.
    ///
    /// Returns `true` if a row was inserted.
    pub async fn insert_if_name_absent(
        pool: &PgPool,
        input: &CreateArtifact,
        image_url: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO artifacts (name, description, production_center, example_location, image_url)
             SELECT $1, $2, $3, $4, $5
             WHERE NOT EXISTS (
                 SELECT 1 FROM artifacts WHERE name = $1 AND deleted_at IS NULL
             )",
        )
        .bind(&input.name)
        .bind(input.description.as_deref().unwrap_or(""))
        .bind(normalize_production_center(input.production_center.as_deref()))
        .bind(&input.example_location)
        .bind(image_url)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
