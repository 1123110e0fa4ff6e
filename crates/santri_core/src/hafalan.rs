//! crates/santri_core/src/hafalan.rs
//!
//! Hafalan (memorization) submissions and their one-way review:
//! `pending -> approved | rejected`.

use chrono::{Datelike, Days, NaiveDate};
use uuid::Uuid;

use crate::domain::{
    Actor, MemorizationSubmission, Review, ReviewDecision, SubmissionFilter, SubmissionStatus,
    WeeklyProgress,
};
use crate::error::{DomainError, DomainResult};
use crate::ports::{Clock, HafalanStore, UserStore};
use crate::rbac::{authorize, can_submit_own_hafalan, Permission, Role};

/// Number of surahs in the mushaf.
pub const SURAH_COUNT: u32 = 114;

/// Input for a new submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub student_id: Uuid,
    pub surah_id: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub date: NaiveDate,
    pub note: Option<String>,
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn validate_range(input: &NewSubmission) -> DomainResult<()> {
    if input.surah_id == 0 || input.surah_id > SURAH_COUNT {
        return Err(DomainError::Validation(format!(
            "surahId must be between 1 and {}",
            SURAH_COUNT
        )));
    }
    if input.start_ayah < 1 {
        return Err(DomainError::Validation("startAyah must be at least 1".to_string()));
    }
    if input.end_ayah < input.start_ayah {
        return Err(DomainError::Validation(
            "endAyah must not be less than startAyah".to_string(),
        ));
    }
    Ok(())
}

/// Anyone may read their own progress; reading someone else's needs `ViewSantriProgress`.
fn ensure_can_view(actor: &Actor, student_id: Uuid) -> DomainResult<()> {
    if actor.id == student_id {
        return Ok(());
    }
    authorize(actor, Permission::ViewSantriProgress)
}

/// Records a new pending submission.
///
/// A santri submits for themselves; instructors holding `RecordSetoran` may
/// record on behalf of any student.
pub async fn submit_memorization<S>(
    store: &S,
    actor: &Actor,
    clock: &dyn Clock,
    input: NewSubmission,
) -> DomainResult<MemorizationSubmission>
where
    S: HafalanStore + UserStore + ?Sized,
{
    let own = actor.id == input.student_id && can_submit_own_hafalan(actor.role);
    if !own {
        authorize(actor, Permission::RecordSetoran)?;
    }
    validate_range(&input)?;
    store.get_user_by_id(input.student_id).await?;

    let submission = MemorizationSubmission {
        id: Uuid::new_v4(),
        student_id: input.student_id,
        date: input.date,
        surah_id: input.surah_id,
        start_ayah: input.start_ayah,
        end_ayah: input.end_ayah,
        status: SubmissionStatus::Pending,
        reviewer_id: None,
        note: clean_note(input.note),
        created_at: clock.now(),
        reviewed_at: None,
    };
    store.insert_submission(submission.clone()).await?;
    tracing::info!(
        submission = %submission.id,
        student = %submission.student_id,
        surah = submission.surah_id,
        "hafalan submitted"
    );
    Ok(submission)
}

/// Moves a pending submission to its terminal state.
///
/// Reviewing a submission that is no longer pending fails with
/// `AlreadyReviewed`, including when a concurrent review wins the race.
pub async fn review_memorization<S>(
    store: &S,
    actor: &Actor,
    clock: &dyn Clock,
    submission_id: Uuid,
    decision: ReviewDecision,
    note: Option<String>,
) -> DomainResult<MemorizationSubmission>
where
    S: HafalanStore + ?Sized,
{
    authorize(actor, Permission::RecordSetoran)?;

    let current = store.get_submission(submission_id).await?;
    if current.status.is_terminal() {
        return Err(DomainError::AlreadyReviewed(submission_id));
    }

    let review = Review {
        status: decision.status(),
        reviewer_id: actor.id,
        note: clean_note(note),
        reviewed_at: clock.now(),
    };
    if !store.apply_review(submission_id, review).await? {
        return Err(DomainError::AlreadyReviewed(submission_id));
    }

    let reviewed = store.get_submission(submission_id).await?;
    tracing::info!(
        submission = %submission_id,
        reviewer = %actor.id,
        status = %reviewed.status,
        "hafalan reviewed"
    );
    Ok(reviewed)
}

/// Lists submissions, most recent first, up to `filter.limit` rows.
pub async fn list_memorizations<S>(
    store: &S,
    actor: &Actor,
    mut filter: SubmissionFilter,
) -> DomainResult<Vec<MemorizationSubmission>>
where
    S: HafalanStore + ?Sized,
{
    if filter.limit == 0 {
        return Err(DomainError::Validation("limit must be at least 1".to_string()));
    }
    match filter.student_id {
        Some(student_id) => ensure_can_view(actor, student_id)?,
        // A santri without an explicit filter sees only their own rows.
        None if actor.role == Role::Santri => filter.student_id = Some(actor.id),
        None => authorize(actor, Permission::ViewSantriProgress)?,
    }
    Ok(store.list_submissions(&filter).await?)
}

/// Approved ayat per calendar week (Monday start) for the trailing `weeks`
/// weeks, oldest first, ending with the current week. `weeks` must be in
/// `1..=max_weeks`.
pub async fn weekly_progress<S>(
    store: &S,
    actor: &Actor,
    clock: &dyn Clock,
    student_id: Uuid,
    weeks: u32,
    max_weeks: u32,
) -> DomainResult<Vec<WeeklyProgress>>
where
    S: HafalanStore + ?Sized,
{
    if weeks == 0 || weeks > max_weeks {
        return Err(DomainError::Validation(format!(
            "weeks must be between 1 and {}",
            max_weeks
        )));
    }
    ensure_can_view(actor, student_id)?;

    let out_of_range = || DomainError::Validation("weeks reach outside the calendar".to_string());
    let today = clock.now().date_naive();
    let current_monday = today
        .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
        .ok_or_else(out_of_range)?;
    let first_monday = current_monday
        .checked_sub_days(Days::new(7 * u64::from(weeks - 1)))
        .ok_or_else(out_of_range)?;
    let last_day = current_monday
        .checked_add_days(Days::new(6))
        .ok_or_else(out_of_range)?;

    let mut buckets: Vec<WeeklyProgress> = (0..weeks)
        .map(|i| {
            let week_start = first_monday + Days::new(7 * u64::from(i));
            let iso = week_start.iso_week();
            WeeklyProgress {
                week_label: format!("{}-W{:02}", iso.year(), iso.week()),
                week_start,
                ayah_count: 0,
            }
        })
        .collect();

    let approved = store
        .list_approved_between(student_id, first_monday, last_day)
        .await?;
    for submission in approved {
        let offset = (submission.date - first_monday).num_days();
        if !(0..7 * i64::from(weeks)).contains(&offset) {
            continue;
        }
        buckets[(offset / 7) as usize].ayah_count += submission.ayah_span();
    }
    Ok(buckets)
}
