//! services/api/src/web/rest.rs
//!
//! The success envelope shared by every REST handler and the master
//! definition for the OpenAPI specification.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::error::ErrorBody;
use crate::web::{attendance, auth, hafalan, halaqoh, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        users::me_handler,
        users::set_role_handler,
        attendance::create_window_handler,
        attendance::list_window_events_handler,
        attendance::scan_handler,
        hafalan::submit_handler,
        hafalan::review_handler,
        hafalan::list_handler,
        hafalan::progress_handler,
        halaqoh::list_halaqoh_handler,
        halaqoh::create_halaqoh_handler,
        halaqoh::list_members_handler,
        halaqoh::add_member_handler,
        halaqoh::remove_member_handler,
    ),
    components(
        schemas(
            ErrorBody,
            auth::SignupRequest,
            auth::LoginRequest,
            users::UserResponse,
            users::SetRoleRequest,
            attendance::CreateWindowRequest,
            attendance::WindowResponse,
            attendance::ScanRequest,
            attendance::ScanResponse,
            attendance::EventResponse,
            hafalan::SubmitRequest,
            hafalan::ReviewRequest,
            hafalan::SubmissionResponse,
            hafalan::WeeklyProgressResponse,
            halaqoh::CreateHalaqohRequest,
            halaqoh::AddMemberRequest,
            halaqoh::HalaqohResponse,
            halaqoh::MemberResponse,
        )
    ),
    tags(
        (name = "Santri Online API", description = "Attendance, hafalan and halaqoh endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Success Envelope
//=========================================================================================

/// Every successful response body is `{ "data": ... }`.
#[derive(Serialize, ToSchema)]
pub struct DataBody<T> {
    pub data: T,
}

/// A `{ "data": ... }` response with an explicit status code.
pub struct Envelope<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.0, Json(DataBody { data: self.1 })).into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Envelope<T> {
    Envelope(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> Envelope<T> {
    Envelope(StatusCode::CREATED, data)
}
