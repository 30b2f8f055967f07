//! Handlers for the `/artifacts` resource.
//!
//! Reads are public. Catalog edits and image uploads require the moderator
//! role. Any authenticated user may add an artifact to their draft.

use archpath_core::artifact::{image_object_key, validate_name};
use archpath_core::error::CoreError;
use archpath_core::trade_analysis::{validate_quantity, DEFAULT_QUANTITY};
use archpath_core::types::DbId;
use archpath_db::models::analysis_record::AnalysisRecord;
use archpath_db::models::artifact::{Artifact, ArtifactListQuery, CreateArtifact, UpdateArtifact};
use archpath_db::repositories::{AnalysisRecordRepo, ArtifactRepo, TradeAnalysisRepo};
use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireModerator;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the image bytes.
const IMAGE_FIELD: &str = "image";

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Artifact",
        id,
    })
}

/// GET /api/artifacts
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ArtifactListQuery>,
) -> AppResult<Json<DataResponse<Vec<Artifact>>>> {
    let artifacts = ArtifactRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: artifacts }))
}

/// GET /api/artifacts/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Artifact>>> {
    let artifact = ArtifactRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: artifact }))
}

/// POST /api/artifacts
pub async fn create(
    State(state): State<AppState>,
    RequireModerator(user): RequireModerator,
    Json(input): Json<CreateArtifact>,
) -> AppResult<(StatusCode, Json<DataResponse<Artifact>>)> {
    validate_name(&input.name)?;

    let artifact = ArtifactRepo::create(&state.pool, &input).await?;
    tracing::info!(
        artifact_id = artifact.id,
        moderator_id = user.user_id,
        "Artifact created"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: artifact })))
}

/// PUT /api/artifacts/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireModerator(user): RequireModerator,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateArtifact>,
) -> AppResult<Json<DataResponse<Artifact>>> {
    if let Some(name) = &input.name {
        validate_name(name)?;
    }

    let artifact = ArtifactRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(artifact_id = id, moderator_id = user.user_id, "Artifact updated");
    Ok(Json(DataResponse { data: artifact }))
}

/// DELETE /api/artifacts/{id}
///
/// Soft-deletes the artifact. Existing request entries keep referencing it.
pub async fn delete(
    State(state): State<AppState>,
    RequireModerator(user): RequireModerator,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !ArtifactRepo::soft_delete(&state.pool, id).await? {
        return Err(not_found(id));
    }
    tracing::info!(artifact_id = id, moderator_id = user.user_id, "Artifact deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/artifacts/{id}/image
///
/// Accepts a multipart upload with an `image` field, stores it under
/// `artifact_{id}` and records the public URL on the artifact.
pub async fn upload_image(
    State(state): State<AppState>,
    RequireModerator(user): RequireModerator,
    Path(id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<Artifact>>> {
    ArtifactRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let mut image: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest(format!(
                "Expected an image upload, got content type '{content_type}'"
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        image = Some((data.to_vec(), content_type));
        break;
    }

    let (data, content_type) = image.ok_or_else(|| {
        AppError::BadRequest(format!("Missing multipart field '{IMAGE_FIELD}'"))
    })?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded image is empty".into()));
    }

    let size = data.len();
    let url = state
        .storage
        .put(&image_object_key(id), data, &content_type)
        .await?;

    let artifact = ArtifactRepo::set_image_url(&state.pool, id, &url)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(
        artifact_id = id,
        moderator_id = user.user_id,
        backend = state.storage.backend_name(),
        size,
        "Artifact image uploaded"
    );
    Ok(Json(DataResponse { data: artifact }))
}

/// Request body for `POST /artifacts/{id}/add-to-analysis`.
#[derive(Debug, Default, Deserialize)]
pub struct AddToAnalysisRequest {
    pub quantity: Option<i32>,
    pub comment: Option<String>,
}

/// The draft entry after an add-to-analysis call.
#[derive(Debug, Serialize)]
pub struct AddToAnalysisResponse {
    pub request_id: DbId,
    /// `true` if a new entry was created, `false` if an existing one was replaced.
    pub created: bool,
    pub entry: AnalysisRecord,
}

/// POST /api/artifacts/{id}/add-to-analysis
///
/// Put the artifact into the caller's draft, creating the draft on first
/// use. Re-adding an artifact replaces its quantity and comment.
/// Responds 201 for a new entry and 200 for a replaced one.
pub async fn add_to_analysis(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<AddToAnalysisResponse>>)> {
    // The body is optional; an empty one means "defaults".
    let input: AddToAnalysisRequest = if body.is_empty() {
        AddToAnalysisRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
    };
    let quantity = input.quantity.unwrap_or(DEFAULT_QUANTITY);
    validate_quantity(quantity)?;

    let artifact = ArtifactRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    if !artifact.is_active {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Artifact {id} is not active"
        ))));
    }

    let mut tx = state.pool.begin().await?;
    let draft = TradeAnalysisRepo::get_or_create_draft(&mut *tx, auth.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Draft was submitted while adding the artifact; retry".into(),
            ))
        })?;
    let upserted = AnalysisRecordRepo::upsert(
        &mut *tx,
        draft.id,
        id,
        quantity,
        input.comment.as_deref().unwrap_or(""),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        user_id = auth.user_id,
        request_id = draft.id,
        artifact_id = id,
        quantity,
        created = upserted.inserted,
        "Artifact added to draft"
    );

    let status = if upserted.inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DataResponse {
            data: AddToAnalysisResponse {
                request_id: draft.id,
                created: upserted.inserted,
                entry: upserted.record,
            },
        }),
    ))
}
