//! services/api/src/web/users.rs
//!
//! The current user and role assignment.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use santri_core::rbac::authorize;
use santri_core::{Permission, Role, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{ApiPath, JsonOrForm};
use crate::web::rest::{ok, DataBody};
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: String,
}

/// GET /me - The authenticated caller
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current user", body = DataBody<UserResponse>),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn me_handler(Extension(user): Extension<User>) -> impl IntoResponse {
    ok(UserResponse::from(&user))
}

/// PUT /users/{id}/role - Assign a role
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    request_body = SetRoleRequest,
    params(("id" = Uuid, Path, description = "The user to update.")),
    responses(
        (status = 200, description = "Role updated", body = DataBody<UserResponse>),
        (status = 400, description = "Unknown role", body = ErrorBody),
        (status = 403, description = "Caller may not manage users", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn set_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
    JsonOrForm(req): JsonOrForm<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&user.actor(), Permission::ManageUsers)?;
    let role: Role = req.role.trim().parse()?;
    let updated = state.db.set_user_role(user_id, role).await?;
    info!(by = %user.id, user = %updated.id, role = %role, "role assigned");
    Ok(ok(UserResponse::from(&updated)))
}
