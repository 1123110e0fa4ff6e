//! crates/santri_core/src/attendance.rs
//!
//! QR attendance: window management and classification of scans into
//! on-time, late and invalid events.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{Actor, AttendanceEvent, AttendanceStatus, AttendanceWindow};
use crate::error::{DomainError, DomainResult};
use crate::ports::{AttendanceStore, Clock};
use crate::rbac::{authorize, Permission};

pub const MSG_WINDOW_NOT_FOUND: &str = "window not found";
pub const MSG_WINDOW_NOT_ACTIVE: &str = "scan window not active";
pub const MSG_RECORDED: &str = "recorded";
pub const MSG_RECORDED_LATE: &str = "recorded (late)";
pub const MSG_ALREADY_RECORDED: &str = "already recorded";

/// Tunables for scan classification.
#[derive(Debug, Clone, Copy)]
pub struct ScanPolicy {
    /// Scans more than this long after `active_from` are late.
    pub late_after: Duration,
    /// When false, a second in-window scan returns the first event instead of storing a new one.
    pub allow_duplicate_scans: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            late_after: Duration::minutes(15),
            allow_duplicate_scans: true,
        }
    }
}

/// Outcome of a scan. `event` is `None` only when nothing was stored.
#[derive(Debug, Clone)]
pub struct AttendanceResult {
    pub status: AttendanceStatus,
    pub message: &'static str,
    pub event: Option<AttendanceEvent>,
}

/// Input for a new QR window.
#[derive(Debug, Clone)]
pub struct NewWindow {
    pub location: String,
    pub code: Option<String>,
    pub active_from: DateTime<Utc>,
    pub active_until: DateTime<Utc>,
}

/// Classifies an in-window or out-of-window scan time against a window.
pub fn classify(window: &AttendanceWindow, now: DateTime<Utc>, policy: &ScanPolicy) -> AttendanceStatus {
    if !window.is_active_at(now) {
        AttendanceStatus::Invalid
    } else if now - window.active_from > policy.late_after {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::OnTime
    }
}

fn message_for(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::OnTime => MSG_RECORDED,
        AttendanceStatus::Late => MSG_RECORDED_LATE,
        AttendanceStatus::Invalid => MSG_WINDOW_NOT_ACTIVE,
    }
}

/// Records a scan of `code` by `actor`.
///
/// An unknown code is a normal `invalid` outcome and stores nothing. Every
/// other call stores exactly one event, out-of-window scans included, unless
/// duplicates are disallowed and the user already has a recorded event.
pub async fn scan_attendance<S>(
    store: &S,
    clock: &dyn Clock,
    policy: &ScanPolicy,
    actor: &Actor,
    code: &str,
    device: Option<String>,
) -> DomainResult<AttendanceResult>
where
    S: AttendanceStore + ?Sized,
{
    authorize(actor, Permission::ScanAttendance)?;
    let user_id = actor.id;
    let code = code.trim();
    if code.is_empty() {
        return Err(DomainError::Validation("code is required".to_string()));
    }

    let Some(window) = store.find_window_by_code(code).await? else {
        tracing::debug!(%user_id, "scan with unknown code");
        return Ok(AttendanceResult {
            status: AttendanceStatus::Invalid,
            message: MSG_WINDOW_NOT_FOUND,
            event: None,
        });
    };

    let now = clock.now();
    let status = classify(&window, now, policy);
    let event = AttendanceEvent {
        id: Uuid::new_v4(),
        window_id: window.id,
        user_id,
        scanned_at: now,
        status,
        device: device.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
    };

    if status != AttendanceStatus::Invalid && !policy.allow_duplicate_scans {
        if let Some(existing) = store.insert_event_unless_recorded(event.clone()).await? {
            return Ok(AttendanceResult {
                status: existing.status,
                message: MSG_ALREADY_RECORDED,
                event: Some(existing),
            });
        }
    } else {
        store.insert_event(event.clone()).await?;
    }
    tracing::info!(
        window = %window.id,
        location = %window.location,
        %user_id,
        status = %status,
        "attendance recorded"
    );

    Ok(AttendanceResult {
        status,
        message: message_for(status),
        event: Some(event),
    })
}

/// Creates a QR window. A missing code gets a freshly generated opaque token.
pub async fn create_window<S>(store: &S, actor: &Actor, input: NewWindow) -> DomainResult<AttendanceWindow>
where
    S: AttendanceStore + ?Sized,
{
    authorize(actor, Permission::ManageAttendance)?;

    let location = input.location.trim();
    if location.is_empty() {
        return Err(DomainError::Validation("location is required".to_string()));
    }
    if input.active_from > input.active_until {
        return Err(DomainError::Validation(
            "activeFrom must not be after activeUntil".to_string(),
        ));
    }
    let code = match input.code.as_deref().map(str::trim) {
        Some("") => return Err(DomainError::Validation("code must not be blank".to_string())),
        Some(code) => code.to_string(),
        None => Uuid::new_v4().simple().to_string(),
    };

    let window = AttendanceWindow {
        id: Uuid::new_v4(),
        location: location.to_string(),
        code,
        active_from: input.active_from,
        active_until: input.active_until,
        created_by: actor.id,
    };
    store.insert_window(window.clone()).await?;
    tracing::info!(window = %window.id, location = %window.location, "attendance window created");
    Ok(window)
}

/// Lists every event recorded against a window, in scan order.
pub async fn list_window_events<S>(
    store: &S,
    actor: &Actor,
    window_id: Uuid,
) -> DomainResult<Vec<AttendanceEvent>>
where
    S: AttendanceStore + ?Sized,
{
    authorize(actor, Permission::ViewAttendanceLog)?;
    store.get_window(window_id).await?;
    let mut events = store.list_events_for_window(window_id).await?;
    events.sort_by_key(|e| e.scanned_at);
    Ok(events)
}
