//! In-memory store and fixed clock shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    AttendanceEvent, AttendanceStatus, AttendanceWindow, Halaqoh, HalaqohMember,
    MemorizationSubmission, Review, SubmissionFilter, SubmissionStatus, User, UserCredentials,
};
use crate::ports::{
    AttendanceStore, Clock, HafalanStore, HalaqohStore, PortError, PortResult, UserStore,
};
use crate::rbac::Role;

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<UserCredentials>>,
    pub windows: Mutex<Vec<AttendanceWindow>>,
    pub events: Mutex<Vec<AttendanceEvent>>,
    pub submissions: Mutex<Vec<MemorizationSubmission>>,
    pub halaqoh: Mutex<Vec<Halaqoh>>,
    pub members: Mutex<Vec<HalaqohMember>>,
    pub offline: AtomicBool,
}

impl MemoryStore {
    pub async fn seed_user(&self, role: Role) -> User {
        let id = Uuid::new_v4();
        self.create_user(
            &format!("user-{}", id.simple()),
            &format!("{}@example.test", id.simple()),
            "hash",
            role,
        )
        .await
        .unwrap()
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<User> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        if users.iter().any(|c| c.user.email == email) {
            return Err(PortError::Conflict(format!("email {} already registered", email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
        };
        users.push(UserCredentials {
            user: user.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.check_online()?;
        self.users
            .lock()
            .await
            .iter()
            .find(|c| c.user.id == user_id)
            .map(|c| c.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.check_online()?;
        self.users
            .lock()
            .await
            .iter()
            .find(|c| c.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn set_user_role(&self, user_id: Uuid, role: Role) -> PortResult<User> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        let creds = users
            .iter_mut()
            .find(|c| c.user.id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        creds.user.role = role;
        Ok(creds.user.clone())
    }

    async fn create_auth_session(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> PortResult<()> {
        Err(PortError::Unexpected("sessions are not kept in memory".to_string()))
    }

    async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_window(&self, window: AttendanceWindow) -> PortResult<()> {
        self.check_online()?;
        let mut windows = self.windows.lock().await;
        if windows.iter().any(|w| w.code == window.code) {
            return Err(PortError::Conflict("scan code already in use".to_string()));
        }
        windows.push(window);
        Ok(())
    }

    async fn find_window_by_code(&self, code: &str) -> PortResult<Option<AttendanceWindow>> {
        self.check_online()?;
        Ok(self
            .windows
            .lock()
            .await
            .iter()
            .find(|w| w.code == code)
            .cloned())
    }

    async fn get_window(&self, window_id: Uuid) -> PortResult<AttendanceWindow> {
        self.check_online()?;
        self.windows
            .lock()
            .await
            .iter()
            .find(|w| w.id == window_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Window {} not found", window_id)))
    }

    async fn insert_event(&self, event: AttendanceEvent) -> PortResult<()> {
        self.check_online()?;
        self.events.lock().await.push(event);
        Ok(())
    }

    async fn insert_event_unless_recorded(
        &self,
        event: AttendanceEvent,
    ) -> PortResult<Option<AttendanceEvent>> {
        self.check_online()?;
        let mut events = self.events.lock().await;
        let existing = events
            .iter()
            .filter(|e| {
                e.window_id == event.window_id
                    && e.user_id == event.user_id
                    && e.status != AttendanceStatus::Invalid
            })
            .min_by_key(|e| e.scanned_at)
            .cloned();
        if existing.is_none() {
            events.push(event);
        }
        Ok(existing)
    }

    async fn list_events_for_window(&self, window_id: Uuid) -> PortResult<Vec<AttendanceEvent>> {
        self.check_online()?;
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.window_id == window_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HafalanStore for MemoryStore {
    async fn insert_submission(&self, submission: MemorizationSubmission) -> PortResult<()> {
        self.check_online()?;
        self.submissions.lock().await.push(submission);
        Ok(())
    }

    async fn get_submission(&self, submission_id: Uuid) -> PortResult<MemorizationSubmission> {
        self.check_online()?;
        self.submissions
            .lock()
            .await
            .iter()
            .find(|s| s.id == submission_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Submission {} not found", submission_id)))
    }

    async fn apply_review(&self, submission_id: Uuid, review: Review) -> PortResult<bool> {
        self.check_online()?;
        let mut submissions = self.submissions.lock().await;
        match submissions
            .iter_mut()
            .find(|s| s.id == submission_id && s.status == SubmissionStatus::Pending)
        {
            Some(s) => {
                s.status = review.status;
                s.reviewer_id = Some(review.reviewer_id);
                s.note = review.note.or(s.note.take());
                s.reviewed_at = Some(review.reviewed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> PortResult<Vec<MemorizationSubmission>> {
        self.check_online()?;
        let members = self.members.lock().await;
        let mut rows: Vec<MemorizationSubmission> = self
            .submissions
            .lock()
            .await
            .iter()
            .filter(|s| filter.student_id.map_or(true, |id| s.student_id == id))
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .filter(|s| {
                filter.halaqoh_id.map_or(true, |h| {
                    members
                        .iter()
                        .any(|m| m.halaqoh_id == h && m.santri_id == s.student_id)
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
        rows.truncate(filter.limit as usize);
        Ok(rows)
    }

    async fn list_approved_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<MemorizationSubmission>> {
        self.check_online()?;
        Ok(self
            .submissions
            .lock()
            .await
            .iter()
            .filter(|s| {
                s.student_id == student_id
                    && s.status == SubmissionStatus::Approved
                    && s.date >= from
                    && s.date <= to
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HalaqohStore for MemoryStore {
    async fn insert_halaqoh(&self, halaqoh: Halaqoh) -> PortResult<()> {
        self.check_online()?;
        self.halaqoh.lock().await.push(halaqoh);
        Ok(())
    }

    async fn get_halaqoh(&self, halaqoh_id: Uuid) -> PortResult<Halaqoh> {
        self.check_online()?;
        self.halaqoh
            .lock()
            .await
            .iter()
            .find(|h| h.id == halaqoh_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Halaqoh {} not found", halaqoh_id)))
    }

    async fn list_halaqoh(&self) -> PortResult<Vec<Halaqoh>> {
        self.check_online()?;
        Ok(self.halaqoh.lock().await.clone())
    }

    async fn add_member(&self, member: HalaqohMember) -> PortResult<()> {
        self.check_online()?;
        let mut members = self.members.lock().await;
        if !members
            .iter()
            .any(|m| m.halaqoh_id == member.halaqoh_id && m.santri_id == member.santri_id)
        {
            members.push(member);
        }
        Ok(())
    }

    async fn remove_member(&self, halaqoh_id: Uuid, santri_id: Uuid) -> PortResult<()> {
        self.check_online()?;
        self.members
            .lock()
            .await
            .retain(|m| !(m.halaqoh_id == halaqoh_id && m.santri_id == santri_id));
        Ok(())
    }

    async fn list_members(&self, halaqoh_id: Uuid) -> PortResult<Vec<HalaqohMember>> {
        self.check_online()?;
        Ok(self
            .members
            .lock()
            .await
            .iter()
            .filter(|m| m.halaqoh_id == halaqoh_id)
            .cloned()
            .collect())
    }
}
