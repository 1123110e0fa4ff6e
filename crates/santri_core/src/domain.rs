//! crates/santri_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::rbac::Role;

//=========================================================================================
// Accounts
//=========================================================================================

/// Represents a community member - used throughout app
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of a domain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

//=========================================================================================
// Attendance
//=========================================================================================

/// A scannable, time-bounded attendance opportunity ("QR window").
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceWindow {
    pub id: Uuid,
    pub location: String,
    pub code: String,
    pub active_from: DateTime<Utc>,
    pub active_until: DateTime<Utc>,
    pub created_by: Uuid,
}

impl AttendanceWindow {
    /// Whether `now` falls inside `[active_from, active_until]`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.active_from && now <= self.active_until
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    OnTime,
    Late,
    Invalid,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "on_time",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_time" => Ok(AttendanceStatus::OnTime),
            "late" => Ok(AttendanceStatus::Late),
            "invalid" => Ok(AttendanceStatus::Invalid),
            other => Err(DomainError::Validation(format!(
                "unknown attendance status '{}'",
                other
            ))),
        }
    }
}

/// One scan attempt's outcome. Status is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub window_id: Uuid,
    pub user_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub device: Option<String>,
}

//=========================================================================================
// Hafalan
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(DomainError::Validation(format!(
                "unknown submission status '{}'",
                other
            ))),
        }
    }
}

/// A reviewer's verdict. Only terminal states can be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn status(&self) -> SubmissionStatus {
        match self {
            ReviewDecision::Approved => SubmissionStatus::Approved,
            ReviewDecision::Rejected => SubmissionStatus::Rejected,
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ReviewDecision::Approved),
            "rejected" => Ok(ReviewDecision::Rejected),
            other => Err(DomainError::Validation(format!(
                "decision must be 'approved' or 'rejected', got '{}'",
                other
            ))),
        }
    }
}

/// A claimed memorization of a contiguous ayah range within one surah.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorizationSubmission {
    pub id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub surah_id: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub status: SubmissionStatus,
    pub reviewer_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl MemorizationSubmission {
    /// Number of ayat covered, both ends inclusive.
    pub fn ayah_span(&self) -> u32 {
        self.end_ayah - self.start_ayah + 1
    }
}

/// The terminal state written by a review.
#[derive(Debug, Clone)]
pub struct Review {
    pub status: SubmissionStatus,
    pub reviewer_id: Uuid,
    pub note: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Read filter for listing submissions, most recent first.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub student_id: Option<Uuid>,
    pub halaqoh_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
    pub limit: u32,
}

/// Approved ayat for one calendar week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyProgress {
    pub week_label: String,
    pub week_start: NaiveDate,
    pub ayah_count: u32,
}

//=========================================================================================
// Halaqoh
//=========================================================================================

/// A study circle of santri under one instructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Halaqoh {
    pub id: Uuid,
    pub name: String,
    pub ustadz_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HalaqohMember {
    pub halaqoh_id: Uuid,
    pub santri_id: Uuid,
    pub joined_at: DateTime<Utc>,
}
