//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! store ports from the `core` crate. It handles all interactions with the
//! SQLite database using `sqlx`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use santri_core::domain::{
    AttendanceEvent, AttendanceWindow, Halaqoh, HalaqohMember, MemorizationSubmission, Review,
    SubmissionFilter, User, UserCredentials,
};
use santri_core::ports::{
    AttendanceStore, HafalanStore, HalaqohStore, PortError, PortResult, UserStore,
};
use santri_core::Role;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every store port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`, creating the file if it does not exist yet.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A private in-memory database. Pinned to one connection that is never
    /// recycled, since each SQLite memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    async fn earliest_recorded_event(
        &self,
        window_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<AttendanceEvent>> {
        let record = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {} FROM absen_log WHERE qr_id = ? AND user_id = ? AND status != 'invalid' \
             ORDER BY waktu ASC LIMIT 1",
            EVENT_COLUMNS
        ))
        .bind(window_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(EventRecord::to_domain).transpose()
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn conflict_or_unexpected(e: sqlx::Error, what: &str) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(format!("{} already exists", what))
        }
        _ => unexpected(e),
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

fn parse_column<T: FromStr>(value: &str, column: &str) -> PortResult<T> {
    value
        .parse::<T>()
        .map_err(|_| PortError::Unexpected(format!("bad value '{}' in column {}", value, column)))
}

fn to_u32(value: i64, column: &str) -> PortResult<u32> {
    u32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("bad value {} in column {}", value, column)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, name, email, role, created_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: parse_column::<Role>(&self.role, "users.role")?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    password_hash: String,
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

const WINDOW_COLUMNS: &str = "id, lokasi, kode, aktif_mulai, aktif_selesai, created_by";

#[derive(FromRow)]
struct WindowRecord {
    id: Uuid,
    lokasi: String,
    kode: String,
    aktif_mulai: DateTime<Utc>,
    aktif_selesai: DateTime<Utc>,
    created_by: Uuid,
}
impl WindowRecord {
    fn to_domain(self) -> AttendanceWindow {
        AttendanceWindow {
            id: self.id,
            location: self.lokasi,
            code: self.kode,
            active_from: self.aktif_mulai,
            active_until: self.aktif_selesai,
            created_by: self.created_by,
        }
    }
}

const EVENT_COLUMNS: &str = "id, qr_id, user_id, waktu, status, device";

#[derive(FromRow)]
struct EventRecord {
    id: Uuid,
    qr_id: Uuid,
    user_id: Uuid,
    waktu: DateTime<Utc>,
    status: String,
    device: Option<String>,
}
impl EventRecord {
    fn to_domain(self) -> PortResult<AttendanceEvent> {
        Ok(AttendanceEvent {
            id: self.id,
            window_id: self.qr_id,
            user_id: self.user_id,
            scanned_at: self.waktu,
            status: parse_column(&self.status, "absen_log.status")?,
            device: self.device,
        })
    }
}

const SUBMISSION_COLUMNS: &str = "id, santri_id, tanggal, surah_id, ayat_mulai, ayat_selesai, \
     status, ustadz_id, catatan, created_at, reviewed_at";

#[derive(FromRow)]
struct SubmissionRecord {
    id: Uuid,
    santri_id: Uuid,
    tanggal: NaiveDate,
    surah_id: i64,
    ayat_mulai: i64,
    ayat_selesai: i64,
    status: String,
    ustadz_id: Option<Uuid>,
    catatan: Option<String>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}
impl SubmissionRecord {
    fn to_domain(self) -> PortResult<MemorizationSubmission> {
        Ok(MemorizationSubmission {
            id: self.id,
            student_id: self.santri_id,
            date: self.tanggal,
            surah_id: to_u32(self.surah_id, "hafalan_sessions.surah_id")?,
            start_ayah: to_u32(self.ayat_mulai, "hafalan_sessions.ayat_mulai")?,
            end_ayah: to_u32(self.ayat_selesai, "hafalan_sessions.ayat_selesai")?,
            status: parse_column(&self.status, "hafalan_sessions.status")?,
            reviewer_id: self.ustadz_id,
            note: self.catatan,
            created_at: self.created_at,
            reviewed_at: self.reviewed_at,
        })
    }
}

#[derive(FromRow)]
struct HalaqohRecord {
    id: Uuid,
    nama: String,
    ustadz_id: Uuid,
    created_at: DateTime<Utc>,
}
impl HalaqohRecord {
    fn to_domain(self) -> Halaqoh {
        Halaqoh {
            id: self.id,
            name: self.nama,
            ustadz_id: self.ustadz_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MemberRecord {
    halaqoh_id: Uuid,
    santri_id: Uuid,
    joined_at: DateTime<Utc>,
}
impl MemberRecord {
    fn to_domain(self) -> HalaqohMember {
        HalaqohMember {
            halaqoh_id: self.halaqoh_id,
            santri_id: self.santri_id,
            joined_at: self.joined_at,
        }
    }
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, "email"))?;
        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;
        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(&format!(
            "SELECT {}, password_hash FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", email)))?;
        Ok(UserCredentials {
            user: record.user.to_domain()?,
            hashed_password: record.password_hash,
        })
    }

    async fn set_user_role(&self, user_id: Uuid, role: Role) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET role = ? WHERE id = ? RETURNING {}",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;
        record.to_domain()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id, expires_at FROM auth_sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            self.delete_auth_session(session_id).await?;
            return Err(PortError::Unauthorized);
        }
        Ok(record.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `AttendanceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AttendanceStore for DbAdapter {
    async fn insert_window(&self, window: AttendanceWindow) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO absen_qr (id, lokasi, kode, aktif_mulai, aktif_selesai, created_by) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(window.id)
        .bind(&window.location)
        .bind(&window.code)
        .bind(window.active_from)
        .bind(window.active_until)
        .bind(window.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, "scan code"))?;
        Ok(())
    }

    async fn find_window_by_code(&self, code: &str) -> PortResult<Option<AttendanceWindow>> {
        let record = sqlx::query_as::<_, WindowRecord>(&format!(
            "SELECT {} FROM absen_qr WHERE kode = ?",
            WINDOW_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(WindowRecord::to_domain))
    }

    async fn get_window(&self, window_id: Uuid) -> PortResult<AttendanceWindow> {
        let record = sqlx::query_as::<_, WindowRecord>(&format!(
            "SELECT {} FROM absen_qr WHERE id = ?",
            WINDOW_COLUMNS
        ))
        .bind(window_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Window {} not found", window_id)))?;
        Ok(record.to_domain())
    }

    async fn insert_event(&self, event: AttendanceEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO absen_log (id, qr_id, user_id, waktu, status, device) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id)
        .bind(event.window_id)
        .bind(event.user_id)
        .bind(event.scanned_at)
        .bind(event.status.as_str())
        .bind(&event.device)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_event_unless_recorded(
        &self,
        event: AttendanceEvent,
    ) -> PortResult<Option<AttendanceEvent>> {
        // A single INSERT takes SQLite's write lock before evaluating its
        // WHERE clause, so concurrent scans cannot both pass the check.
        let result = sqlx::query(
            "INSERT INTO absen_log (id, qr_id, user_id, waktu, status, device) \
             SELECT ?, ?, ?, ?, ?, ? \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM absen_log WHERE qr_id = ? AND user_id = ? AND status != 'invalid' \
             )",
        )
        .bind(event.id)
        .bind(event.window_id)
        .bind(event.user_id)
        .bind(event.scanned_at)
        .bind(event.status.as_str())
        .bind(&event.device)
        .bind(event.window_id)
        .bind(event.user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 1 {
            return Ok(None);
        }
        self.earliest_recorded_event(event.window_id, event.user_id)
            .await?
            .map(Some)
            .ok_or_else(|| {
                PortError::Unexpected(format!(
                    "scan by {} skipped but no recorded event found",
                    event.user_id
                ))
            })
    }

    async fn list_events_for_window(&self, window_id: Uuid) -> PortResult<Vec<AttendanceEvent>> {
        let records = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {} FROM absen_log WHERE qr_id = ? ORDER BY waktu ASC",
            EVENT_COLUMNS
        ))
        .bind(window_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(EventRecord::to_domain).collect()
    }
}

//=========================================================================================
// `HafalanStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HafalanStore for DbAdapter {
    async fn insert_submission(&self, submission: MemorizationSubmission) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO hafalan_sessions \
             (id, santri_id, tanggal, surah_id, ayat_mulai, ayat_selesai, status, ustadz_id, catatan, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.id)
        .bind(submission.student_id)
        .bind(submission.date)
        .bind(i64::from(submission.surah_id))
        .bind(i64::from(submission.start_ayah))
        .bind(i64::from(submission.end_ayah))
        .bind(submission.status.as_str())
        .bind(submission.reviewer_id)
        .bind(&submission.note)
        .bind(submission.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_submission(&self, submission_id: Uuid) -> PortResult<MemorizationSubmission> {
        let record = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM hafalan_sessions WHERE id = ?",
            SUBMISSION_COLUMNS
        ))
        .bind(submission_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, format!("Submission {} not found", submission_id))
        })?;
        record.to_domain()
    }

    async fn apply_review(&self, submission_id: Uuid, review: Review) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE hafalan_sessions \
             SET status = ?, ustadz_id = ?, catatan = COALESCE(?, catatan), reviewed_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(review.status.as_str())
        .bind(review.reviewer_id)
        .bind(&review.note)
        .bind(review.reviewed_at)
        .bind(submission_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> PortResult<Vec<MemorizationSubmission>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM hafalan_sessions WHERE 1 = 1",
            SUBMISSION_COLUMNS
        ));
        if let Some(student_id) = filter.student_id {
            query.push(" AND santri_id = ").push_bind(student_id);
        }
        if let Some(halaqoh_id) = filter.halaqoh_id {
            query
                .push(" AND santri_id IN (SELECT santri_id FROM halaqoh_members WHERE halaqoh_id = ")
                .push_bind(halaqoh_id)
                .push(")");
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query
            .push(" ORDER BY tanggal DESC, created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit));

        let records = query
            .build_query_as::<SubmissionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(SubmissionRecord::to_domain).collect()
    }

    async fn list_approved_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<MemorizationSubmission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM hafalan_sessions \
             WHERE santri_id = ? AND status = 'approved' AND tanggal >= ? AND tanggal <= ? \
             ORDER BY tanggal ASC",
            SUBMISSION_COLUMNS
        ))
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SubmissionRecord::to_domain).collect()
    }
}

//=========================================================================================
// `HalaqohStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HalaqohStore for DbAdapter {
    async fn insert_halaqoh(&self, halaqoh: Halaqoh) -> PortResult<()> {
        sqlx::query("INSERT INTO halaqoh (id, nama, ustadz_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(halaqoh.id)
            .bind(&halaqoh.name)
            .bind(halaqoh.ustadz_id)
            .bind(halaqoh.created_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_halaqoh(&self, halaqoh_id: Uuid) -> PortResult<Halaqoh> {
        let record = sqlx::query_as::<_, HalaqohRecord>(
            "SELECT id, nama, ustadz_id, created_at FROM halaqoh WHERE id = ?",
        )
        .bind(halaqoh_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Halaqoh {} not found", halaqoh_id)))?;
        Ok(record.to_domain())
    }

    async fn list_halaqoh(&self) -> PortResult<Vec<Halaqoh>> {
        let records = sqlx::query_as::<_, HalaqohRecord>(
            "SELECT id, nama, ustadz_id, created_at FROM halaqoh ORDER BY nama ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(HalaqohRecord::to_domain).collect())
    }

    async fn add_member(&self, member: HalaqohMember) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO halaqoh_members (halaqoh_id, santri_id, joined_at) VALUES (?, ?, ?) \
             ON CONFLICT (halaqoh_id, santri_id) DO NOTHING",
        )
        .bind(member.halaqoh_id)
        .bind(member.santri_id)
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn remove_member(&self, halaqoh_id: Uuid, santri_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM halaqoh_members WHERE halaqoh_id = ? AND santri_id = ?")
            .bind(halaqoh_id)
            .bind(santri_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_members(&self, halaqoh_id: Uuid) -> PortResult<Vec<HalaqohMember>> {
        let records = sqlx::query_as::<_, MemberRecord>(
            "SELECT halaqoh_id, santri_id, joined_at FROM halaqoh_members \
             WHERE halaqoh_id = ? ORDER BY joined_at ASC",
        )
        .bind(halaqoh_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(MemberRecord::to_domain).collect())
    }
}
