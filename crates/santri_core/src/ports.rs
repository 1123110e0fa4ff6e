//! crates/santri_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    AttendanceEvent, AttendanceWindow, Halaqoh, HalaqohMember, MemorizationSubmission, Review,
    SubmissionFilter, User, UserCredentials,
};
use crate::rbac::Role;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn set_user_role(&self, user_id: Uuid, role: Role) -> PortResult<User>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owner of a live session; expired sessions are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Fails with `PortError::Conflict` when the scan code is already taken.
    async fn insert_window(&self, window: AttendanceWindow) -> PortResult<()>;

    async fn find_window_by_code(&self, code: &str) -> PortResult<Option<AttendanceWindow>>;

    async fn get_window(&self, window_id: Uuid) -> PortResult<AttendanceWindow>;

    async fn insert_event(&self, event: AttendanceEvent) -> PortResult<()>;

    /// Stores `event` unless its user already has an on-time or late event for
    /// the same window. In that case nothing is written and the earliest such
    /// event is returned. The check and the insert are one atomic step.
    async fn insert_event_unless_recorded(
        &self,
        event: AttendanceEvent,
    ) -> PortResult<Option<AttendanceEvent>>;

    async fn list_events_for_window(&self, window_id: Uuid) -> PortResult<Vec<AttendanceEvent>>;
}

#[async_trait]
pub trait HafalanStore: Send + Sync {
    async fn insert_submission(&self, submission: MemorizationSubmission) -> PortResult<()>;

    async fn get_submission(&self, submission_id: Uuid) -> PortResult<MemorizationSubmission>;

    /// Writes the review only while the submission is still pending.
    /// Returns `false` if another review got there first.
    async fn apply_review(&self, submission_id: Uuid, review: Review) -> PortResult<bool>;

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> PortResult<Vec<MemorizationSubmission>>;

    /// Approved submissions of a student dated within `[from, to]`.
    async fn list_approved_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<MemorizationSubmission>>;
}

#[async_trait]
pub trait HalaqohStore: Send + Sync {
    async fn insert_halaqoh(&self, halaqoh: Halaqoh) -> PortResult<()>;

    async fn get_halaqoh(&self, halaqoh_id: Uuid) -> PortResult<Halaqoh>;

    async fn list_halaqoh(&self) -> PortResult<Vec<Halaqoh>>;

    /// Adding an existing member leaves the original row in place.
    async fn add_member(&self, member: HalaqohMember) -> PortResult<()>;

    async fn remove_member(&self, halaqoh_id: Uuid, santri_id: Uuid) -> PortResult<()>;

    async fn list_members(&self, halaqoh_id: Uuid) -> PortResult<Vec<HalaqohMember>>;
}

/// The full persistence surface the API service needs.
pub trait DatabaseService: UserStore + AttendanceStore + HafalanStore + HalaqohStore {}

impl<T> DatabaseService for T where T: UserStore + AttendanceStore + HafalanStore + HalaqohStore {}

//=========================================================================================
// Clock
//=========================================================================================

/// Source of the current time, injected so scans can be classified deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
