//! services/api/src/web/hafalan.rs
//!
//! Hafalan submission, review, listing and weekly progress.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use santri_core::hafalan;
use santri_core::{
    MemorizationSubmission, NewSubmission, ReviewDecision, SubmissionFilter, SubmissionStatus,
    User, WeeklyProgress,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{ApiPath, ApiQuery, JsonOrForm};
use crate::web::protocol::LiveEvent;
use crate::web::rest::{created, ok, DataBody};
use crate::web::state::AppState;

const DEFAULT_PROGRESS_WEEKS: u32 = 8;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Defaults to the caller.
    pub santri_id: Option<Uuid>,
    pub surah_id: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// `approved` or `rejected`.
    pub decision: String,
    pub note: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub santri_id: Uuid,
    pub date: NaiveDate,
    pub surah_id: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub status: String,
    pub ustadz_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<&MemorizationSubmission> for SubmissionResponse {
    fn from(s: &MemorizationSubmission) -> Self {
        Self {
            id: s.id,
            santri_id: s.student_id,
            date: s.date,
            surah_id: s.surah_id,
            start_ayah: s.start_ayah,
            end_ayah: s.end_ayah,
            status: s.status.to_string(),
            ustadz_id: s.reviewer_id,
            note: s.note.clone(),
            created_at: s.created_at,
            reviewed_at: s.reviewed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyProgressResponse {
    pub week_label: String,
    pub week_start: NaiveDate,
    pub ayah_count: u32,
}

impl From<WeeklyProgress> for WeeklyProgressResponse {
    fn from(w: WeeklyProgress) -> Self {
        Self {
            week_label: w.week_label,
            week_start: w.week_start,
            ayah_count: w.ayah_count,
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub santri_id: Option<Uuid>,
    pub halaqoh_id: Option<Uuid>,
    /// `pending`, `approved` or `rejected`.
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProgressQuery {
    /// Defaults to the caller.
    pub santri_id: Option<Uuid>,
    pub weeks: Option<u32>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Submit a memorized ayah range for review.
#[utoipa::path(
    post,
    path = "/hafalan",
    request_body = SubmitRequest,
    responses(
        (status = 201, description = "Submission recorded as pending", body = DataBody<SubmissionResponse>),
        (status = 400, description = "Invalid surah or ayah range", body = ErrorBody),
        (status = 403, description = "Caller may not submit for this santri", body = ErrorBody),
        (status = 404, description = "No such santri", body = ErrorBody)
    )
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    JsonOrForm(req): JsonOrForm<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = NewSubmission {
        student_id: req.santri_id.unwrap_or(user.id),
        surah_id: req.surah_id,
        start_ayah: req.start_ayah,
        end_ayah: req.end_ayah,
        date: req.date.unwrap_or_else(|| state.clock.now().date_naive()),
        note: req.note,
    };
    let submission = hafalan::submit_memorization(
        state.db.as_ref(),
        &user.actor(),
        state.clock.as_ref(),
        input,
    )
    .await?;
    state
        .broadcaster
        .publish(LiveEvent::submitted(&submission))
        .await;
    Ok(created(SubmissionResponse::from(&submission)))
}

/// Approve or reject a pending submission.
#[utoipa::path(
    post,
    path = "/hafalan/{id}/review",
    request_body = ReviewRequest,
    params(("id" = Uuid, Path, description = "The submission.")),
    responses(
        (status = 200, description = "Submission reviewed", body = DataBody<SubmissionResponse>),
        (status = 400, description = "Unknown decision", body = ErrorBody),
        (status = 403, description = "Caller may not review setoran", body = ErrorBody),
        (status = 404, description = "No such submission", body = ErrorBody),
        (status = 409, description = "Submission already reviewed", body = ErrorBody)
    )
)]
pub async fn review_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(submission_id): ApiPath<Uuid>,
    JsonOrForm(req): JsonOrForm<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let decision: ReviewDecision = req.decision.trim().parse()?;
    let reviewed = hafalan::review_memorization(
        state.db.as_ref(),
        &user.actor(),
        state.clock.as_ref(),
        submission_id,
        decision,
        req.note,
    )
    .await?;
    state
        .broadcaster
        .publish(LiveEvent::reviewed(&reviewed))
        .await;
    Ok(ok(SubmissionResponse::from(&reviewed)))
}

/// List submissions, most recent first.
#[utoipa::path(
    get,
    path = "/hafalan",
    params(ListQuery),
    responses(
        (status = 200, description = "Submissions", body = DataBody<Vec<SubmissionResponse>>),
        (status = 400, description = "Invalid filter", body = ErrorBody),
        (status = 403, description = "Caller may not view this santri", body = ErrorBody)
    )
)]
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<SubmissionStatus>)
        .transpose()?;
    let limit = query
        .limit
        .unwrap_or(state.config.default_list_limit)
        .clamp(1, state.config.max_list_limit);

    let filter = SubmissionFilter {
        student_id: query.santri_id,
        halaqoh_id: query.halaqoh_id,
        status,
        limit,
    };
    let rows = hafalan::list_memorizations(state.db.as_ref(), &user.actor(), filter).await?;
    Ok(ok(rows.iter().map(SubmissionResponse::from).collect::<Vec<_>>()))
}

/// Approved ayat per calendar week.
#[utoipa::path(
    get,
    path = "/hafalan/progress",
    params(ProgressQuery),
    responses(
        (status = 200, description = "One bucket per week, oldest first", body = DataBody<Vec<WeeklyProgressResponse>>),
        (status = 400, description = "Invalid week count", body = ErrorBody),
        (status = 403, description = "Caller may not view this santri", body = ErrorBody)
    )
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<ProgressQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let weeks = query.weeks.unwrap_or(DEFAULT_PROGRESS_WEEKS);
    let progress = hafalan::weekly_progress(
        state.db.as_ref(),
        &user.actor(),
        state.clock.as_ref(),
        query.santri_id.unwrap_or(user.id),
        weeks,
        state.config.max_progress_weeks,
    )
    .await?;
    Ok(ok(progress
        .into_iter()
        .map(WeeklyProgressResponse::from)
        .collect::<Vec<_>>()))
}
