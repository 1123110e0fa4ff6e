//! services/api/src/web/halaqoh.rs
//!
//! Study-circle management.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use santri_core::halaqoh;
use santri_core::{Halaqoh, HalaqohMember, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{ApiPath, JsonOrForm};
use crate::web::rest::{created, ok, DataBody};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHalaqohRequest {
    pub name: String,
    pub ustadz_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub santri_id: Uuid,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HalaqohResponse {
    pub id: Uuid,
    pub name: String,
    pub ustadz_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Halaqoh> for HalaqohResponse {
    fn from(h: Halaqoh) -> Self {
        Self {
            id: h.id,
            name: h.name,
            ustadz_id: h.ustadz_id,
            created_at: h.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub halaqoh_id: Uuid,
    pub santri_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

impl From<HalaqohMember> for MemberResponse {
    fn from(m: HalaqohMember) -> Self {
        Self {
            halaqoh_id: m.halaqoh_id,
            santri_id: m.santri_id,
            joined_at: m.joined_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/halaqoh",
    responses((status = 200, description = "All halaqoh by name", body = DataBody<Vec<HalaqohResponse>>))
)]
pub async fn list_halaqoh_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = halaqoh::list_halaqoh(state.db.as_ref()).await?;
    Ok(ok(rows.into_iter().map(HalaqohResponse::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/halaqoh",
    request_body = CreateHalaqohRequest,
    responses(
        (status = 201, description = "Halaqoh created", body = DataBody<HalaqohResponse>),
        (status = 400, description = "Missing name", body = ErrorBody),
        (status = 403, description = "Caller may not manage halaqoh", body = ErrorBody),
        (status = 404, description = "No such ustadz", body = ErrorBody)
    )
)]
pub async fn create_halaqoh_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    JsonOrForm(req): JsonOrForm<CreateHalaqohRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created_halaqoh = halaqoh::create_halaqoh(
        state.db.as_ref(),
        &user.actor(),
        state.clock.as_ref(),
        &req.name,
        req.ustadz_id,
    )
    .await?;
    Ok(created(HalaqohResponse::from(created_halaqoh)))
}

#[utoipa::path(
    get,
    path = "/halaqoh/{id}/members",
    params(("id" = Uuid, Path, description = "The halaqoh.")),
    responses(
        (status = 200, description = "Members by join date", body = DataBody<Vec<MemberResponse>>),
        (status = 404, description = "No such halaqoh", body = ErrorBody)
    )
)]
pub async fn list_members_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(halaqoh_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let members = halaqoh::list_members(state.db.as_ref(), halaqoh_id).await?;
    Ok(ok(members.into_iter().map(MemberResponse::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/halaqoh/{id}/members",
    request_body = AddMemberRequest,
    params(("id" = Uuid, Path, description = "The halaqoh.")),
    responses(
        (status = 201, description = "Santri is a member", body = DataBody<MemberResponse>),
        (status = 403, description = "Caller may not manage halaqoh", body = ErrorBody),
        (status = 404, description = "No such halaqoh or santri", body = ErrorBody)
    )
)]
pub async fn add_member_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(halaqoh_id): ApiPath<Uuid>,
    JsonOrForm(req): JsonOrForm<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let member = halaqoh::add_member(
        state.db.as_ref(),
        &user.actor(),
        state.clock.as_ref(),
        halaqoh_id,
        req.santri_id,
    )
    .await?;
    Ok(created(MemberResponse::from(member)))
}

#[utoipa::path(
    delete,
    path = "/halaqoh/{id}/members/{santri_id}",
    params(
        ("id" = Uuid, Path, description = "The halaqoh."),
        ("santri_id" = Uuid, Path, description = "The santri to remove.")
    ),
    responses(
        (status = 204, description = "Santri removed"),
        (status = 403, description = "Caller may not manage halaqoh", body = ErrorBody),
        (status = 404, description = "No such halaqoh", body = ErrorBody)
    )
)]
pub async fn remove_member_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath((halaqoh_id, santri_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    halaqoh::remove_member(state.db.as_ref(), &user.actor(), halaqoh_id, santri_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
