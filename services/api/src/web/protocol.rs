//! services/api/src/web/protocol.rs
//!
//! Defines the messages pushed to live-feed subscribers over the WebSocket.

use chrono::{DateTime, NaiveDate, Utc};
use santri_core::{AttendanceEvent, MemorizationSubmission};
use serde::Serialize;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// NOTE: The feed is one-way. Anything the client sends besides Close is ignored.
//=========================================================================================

/// Represents the structured text messages the server pushes to subscribers.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LiveEvent {
    /// A scan was stored, whatever its status.
    AttendanceRecorded {
        event_id: Uuid,
        window_id: Uuid,
        user_id: Uuid,
        status: String,
        scanned_at: DateTime<Utc>,
    },

    /// A new submission is waiting for review.
    HafalanSubmitted {
        submission_id: Uuid,
        student_id: Uuid,
        date: NaiveDate,
        surah_id: u32,
        start_ayah: u32,
        end_ayah: u32,
    },

    /// A submission reached its terminal state.
    HafalanReviewed {
        submission_id: Uuid,
        student_id: Uuid,
        reviewer_id: Option<Uuid>,
        status: String,
    },
}

impl LiveEvent {
    pub fn attendance(event: &AttendanceEvent) -> Self {
        LiveEvent::AttendanceRecorded {
            event_id: event.id,
            window_id: event.window_id,
            user_id: event.user_id,
            status: event.status.to_string(),
            scanned_at: event.scanned_at,
        }
    }

    pub fn submitted(submission: &MemorizationSubmission) -> Self {
        LiveEvent::HafalanSubmitted {
            submission_id: submission.id,
            student_id: submission.student_id,
            date: submission.date,
            surah_id: submission.surah_id,
            start_ayah: submission.start_ayah,
            end_ayah: submission.end_ayah,
        }
    }

    pub fn reviewed(submission: &MemorizationSubmission) -> Self {
        LiveEvent::HafalanReviewed {
            submission_id: submission.id,
            student_id: submission.student_id,
            reviewer_id: submission.reviewer_id,
            status: submission.status.to_string(),
        }
    }
}
