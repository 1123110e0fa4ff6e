//! services/api/src/web/attendance.rs
//!
//! QR window management and the scan endpoint.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use santri_core::attendance::{self, MSG_ALREADY_RECORDED};
use santri_core::{AttendanceEvent, AttendanceWindow, NewWindow, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{ApiPath, JsonOrForm};
use crate::web::protocol::LiveEvent;
use crate::web::rest::{created, ok, DataBody};
use crate::web::state::AppState;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWindowRequest {
    pub location: String,
    /// Omit to have an opaque code generated.
    pub code: Option<String>,
    pub active_from: DateTime<Utc>,
    pub active_until: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindowResponse {
    pub id: Uuid,
    pub location: String,
    pub code: String,
    pub active_from: DateTime<Utc>,
    pub active_until: DateTime<Utc>,
    pub created_by: Uuid,
}

impl From<AttendanceWindow> for WindowResponse {
    fn from(w: AttendanceWindow) -> Self {
        Self {
            id: w.id,
            location: w.location,
            code: w.code,
            active_from: w.active_from,
            active_until: w.active_until,
            created_by: w.created_by,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    pub code: String,
    pub device: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: Uuid,
    pub window_id: Uuid,
    pub user_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub status: String,
    pub device: Option<String>,
}

impl From<&AttendanceEvent> for EventResponse {
    fn from(e: &AttendanceEvent) -> Self {
        Self {
            id: e.id,
            window_id: e.window_id,
            user_id: e.user_id,
            scanned_at: e.scanned_at,
            status: e.status.to_string(),
            device: e.device.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ScanResponse {
    /// One of `on_time`, `late`, `invalid`.
    pub status: String,
    pub message: String,
    /// Absent when the code matched no window.
    pub event: Option<EventResponse>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Create a QR attendance window.
#[utoipa::path(
    post,
    path = "/attendance/windows",
    request_body = CreateWindowRequest,
    responses(
        (status = 201, description = "Window created", body = DataBody<WindowResponse>),
        (status = 400, description = "Invalid window or code already in use", body = ErrorBody),
        (status = 403, description = "Caller may not manage attendance", body = ErrorBody)
    )
)]
pub async fn create_window_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    JsonOrForm(req): JsonOrForm<CreateWindowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let window = attendance::create_window(
        state.db.as_ref(),
        &user.actor(),
        NewWindow {
            location: req.location,
            code: req.code,
            active_from: req.active_from,
            active_until: req.active_until,
        },
    )
    .await?;
    Ok(created(WindowResponse::from(window)))
}

/// List every scan recorded against a window.
#[utoipa::path(
    get,
    path = "/attendance/windows/{id}/events",
    params(("id" = Uuid, Path, description = "The window.")),
    responses(
        (status = 200, description = "Events in scan order", body = DataBody<Vec<EventResponse>>),
        (status = 403, description = "Caller may not view the attendance log", body = ErrorBody),
        (status = 404, description = "No such window", body = ErrorBody)
    )
)]
pub async fn list_window_events_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(window_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let events = attendance::list_window_events(state.db.as_ref(), &user.actor(), window_id).await?;
    Ok(ok(events.iter().map(EventResponse::from).collect::<Vec<_>>()))
}

/// Scan a QR code. Unknown and expired codes are reported in the body, not as errors.
#[utoipa::path(
    post,
    path = "/attendance/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan classified", body = DataBody<ScanResponse>),
        (status = 400, description = "Missing code", body = ErrorBody),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn scan_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    JsonOrForm(req): JsonOrForm<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = attendance::scan_attendance(
        state.db.as_ref(),
        state.clock.as_ref(),
        &state.scan_policy(),
        &user.actor(),
        &req.code,
        req.device,
    )
    .await?;

    if let Some(event) = result.event.as_ref().filter(|_| result.message != MSG_ALREADY_RECORDED) {
        state.broadcaster.publish(LiveEvent::attendance(event)).await;
    }

    Ok(ok(ScanResponse {
        status: result.status.to_string(),
        message: result.message.to_string(),
        event: result.event.as_ref().map(EventResponse::from),
    }))
}
