//! Booking orchestrator: the transactional core plus post-commit side effects.

use std::future::Future;

use calendar_sync::{CalendarSync, LessonSync};
use database::{
    availability, booking, user, wallet, Booking, BookingStatus, Database, DatabaseError, DayOfWeek,
    NewBooking, Posting, Role, User,
};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::error::{BookingError, ValidationError};
use crate::pricing::lesson_cost;
use crate::resolver::is_bookable;
use crate::validation::{BookingRequest, ValidatedBooking};

/// State of calendar sync when a call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalendarStatus {
    /// At least one participant's calendar has the event.
    Synced { event_id: String },
    /// Neither participant connected a calendar.
    NotConnected,
    /// Sync ran and produced no event.
    Failed,
    /// Sync is still running in the background.
    Pending,
}

/// A committed booking.
#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub trial: bool,
    /// Amount debited, zero for trial lessons.
    pub cost_cents: i64,
    pub calendar: CalendarStatus,
}

impl BookingOutcome {
    pub fn calendar_event_id(&self) -> Option<&str> {
        match &self.calendar {
            CalendarStatus::Synced { event_id } => Some(event_id),
            _ => None,
        }
    }
}

/// Compensation applied after a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Refund {
    Credited { amount_cents: i64, transaction_id: i64 },
    TrialRestored,
    /// An earlier cancellation attempt already compensated.
    AlreadyRefunded,
    /// Left for manual follow-up; the cancellation itself stands.
    Failed,
}

/// Calendar cleanup after a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalendarCleanup {
    Removed { events: usize },
    NothingToRemove,
    Failed,
    Pending,
}

/// A cancelled booking and its follow-up steps.
#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund: Refund,
    pub calendar: CalendarCleanup,
}

/// What funded a booking inside the commit.
enum Funding {
    Trial,
    Wallet { transaction_id: i64, amount_cents: i64 },
}

/// Books, cancels and completes lessons.
///
/// Funding and the booking row are committed together or not at all.
/// Calendar sync runs afterwards and never changes the booking result.
#[derive(Clone)]
pub struct BookingOrchestrator {
    db: Database,
    calendar: CalendarSync,
    config: EngineConfig,
}

impl BookingOrchestrator {
    pub fn new(db: Database, calendar: CalendarSync, config: EngineConfig) -> Self {
        Self { db, calendar, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Book a lesson for the calling student.
    pub async fn book(&self, ctx: &RequestContext, request: &BookingRequest) -> Result<BookingOutcome, BookingError> {
        if ctx.role != Role::Student {
            return Err(BookingError::Forbidden("only students can book lessons"));
        }

        let valid = request.validate(ctx.now)?;
        let teacher = user::get_teacher(self.db.pool(), valid.teacher_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => BookingError::TeacherNotFound(valid.teacher_id),
                other => other.into(),
            })?;

        let mut tx = self.db.begin().await?;
        let (booking, funding) = self.commit_booking(&mut tx, ctx.user_id, &teacher, &valid).await?;
        tx.commit().await?;

        let (trial, cost_cents) = match funding {
            Funding::Trial => (true, 0),
            Funding::Wallet { amount_cents, .. } => (false, amount_cents),
        };
        info!(
            booking_id = booking.id,
            teacher_id = teacher.id,
            student_id = ctx.user_id,
            date = %booking.lesson_date,
            start = %booking.start_time,
            trial,
            cost_cents,
            "Lesson booked"
        );

        let calendar = self.sync_new_booking(&booking).await;

        Ok(BookingOutcome {
            booking,
            trial,
            cost_cents,
            calendar,
        })
    }

    /// Feasibility re-check, funding and insert on one connection.
    async fn commit_booking(
        &self,
        conn: &mut SqliteConnection,
        student_id: i64,
        teacher: &User,
        valid: &ValidatedBooking,
    ) -> Result<(Booking, Funding), BookingError> {
        // First statement writes, so concurrent commits queue on the lock
        // instead of both reading the same snapshot.
        wallet::ensure_wallet(&mut *conn, student_id).await?;

        let rules = availability::active_rules_for_day(&mut *conn, teacher.id, DayOfWeek::of(valid.date)).await?;
        let existing = booking::live_bookings_on(&mut *conn, teacher.id, valid.date).await?;
        if !is_bookable(&rules, &existing, valid.date, valid.range) {
            return Err(BookingError::SlotUnavailable);
        }
        if booking::live_booking_exists(&mut *conn, teacher.id, valid.date, valid.range.start).await? {
            return Err(BookingError::SlotUnavailable);
        }

        let funding = self.fund(&mut *conn, student_id, teacher, valid).await?;
        let funding_transaction_id = match funding {
            Funding::Trial => None,
            Funding::Wallet { transaction_id, .. } => Some(transaction_id),
        };

        let new_booking = NewBooking {
            teacher_id: teacher.id,
            student_id,
            lesson_date: valid.date,
            start_time: valid.range.start,
            end_time: valid.range.end,
            is_trial: matches!(funding, Funding::Trial),
            funding_transaction_id,
            category: valid.category.clone(),
        };
        let booking = booking::insert_booking(&mut *conn, &new_booking)
            .await
            .map_err(|e| match e {
                DatabaseError::AlreadyExists { .. } => BookingError::SlotUnavailable,
                other => other.into(),
            })?;

        Ok((booking, funding))
    }

    /// Use the trial credit if the student still has it, else debit the wallet.
    async fn fund(
        &self,
        conn: &mut SqliteConnection,
        student_id: i64,
        teacher: &User,
        valid: &ValidatedBooking,
    ) -> Result<Funding, BookingError> {
        let trial_reference = format!("trial:{}", uuid::Uuid::new_v4());
        if wallet::consume_trial_credit(&mut *conn, student_id, &trial_reference)
            .await?
            .is_some()
        {
            return Ok(Funding::Trial);
        }

        let rate = teacher
            .hourly_rate_cents
            .filter(|rate| *rate > 0)
            .unwrap_or(self.config.default_hourly_rate_cents);
        let cost = lesson_cost(rate, &valid.range)?;
        let reference = format!("lesson:{}", uuid::Uuid::new_v4());
        let description = format!(
            "Lesson with {} on {} at {}",
            teacher.name,
            valid.date,
            valid.range.start.format("%H:%M")
        );

        let posting = wallet::debit(&mut *conn, student_id, cost, &reference, &description)
            .await
            .map_err(|e| match e {
                DatabaseError::InsufficientBalance {
                    required_cents,
                    available_cents,
                } => BookingError::InsufficientBalance {
                    required_cents,
                    available_cents,
                },
                other => other.into(),
            })?;

        let row = match posting {
            Posting::Applied(row) => row,
            Posting::AlreadyApplied(row) => {
                error!(
                    student_id,
                    teacher_id = teacher.id,
                    reference = %reference,
                    transaction_id = row.id,
                    "Fresh debit reference already present in ledger"
                );
                return Err(BookingError::Inconsistency(format!(
                    "debit reference {} already used by transaction {}",
                    reference, row.id
                )));
            }
        };

        if row.amount_cents != -cost || row.student_id != student_id {
            error!(
                student_id,
                teacher_id = teacher.id,
                transaction_id = row.id,
                expected_cents = -cost,
                recorded_cents = row.amount_cents,
                "Debit audit row does not match the debit"
            );
            return Err(BookingError::Inconsistency(format!(
                "transaction {} records {} cents, expected {}",
                row.id, row.amount_cents, -cost
            )));
        }

        Ok(Funding::Wallet {
            transaction_id: row.id,
            amount_cents: cost,
        })
    }

    /// Run `task` detached and wait for it at most `calendar_wait`.
    async fn bounded_side_effect<T, F>(&self, task: F) -> Option<Result<T, tokio::task::JoinError>>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        tokio::time::timeout(self.config.calendar_wait, handle).await.ok()
    }

    async fn sync_new_booking(&self, lesson: &Booking) -> CalendarStatus {
        let calendar = self.calendar.clone();
        let detached = lesson.clone();

        match self
            .bounded_side_effect(async move { calendar.create_lesson_events(&detached).await })
            .await
        {
            Some(Ok(sync)) => calendar_status(&sync),
            Some(Err(e)) => {
                warn!(booking_id = lesson.id, error = %e, "Calendar sync task failed");
                CalendarStatus::Failed
            }
            None => {
                info!(booking_id = lesson.id, "Calendar sync still running");
                CalendarStatus::Pending
            }
        }
    }

    /// Cancel a scheduled lesson, then refund and remove calendar events.
    ///
    /// Only the lesson's student, its teacher or an admin may cancel, and
    /// non-admins only before the lesson starts.
    pub async fn cancel(&self, ctx: &RequestContext, booking_id: i64) -> Result<CancellationOutcome, BookingError> {
        let existing = self.load_booking(booking_id).await?;
        if !(ctx.is_admin() || ctx.user_id == existing.student_id || ctx.user_id == existing.teacher_id) {
            return Err(BookingError::Forbidden("not a participant of this booking"));
        }
        if !ctx.is_admin() && existing.lesson_date.and_time(existing.start_time) <= ctx.now {
            return Err(ValidationError::InPast.into());
        }

        let mut tx = self.db.begin().await?;
        let cancelled = booking::cancel_scheduled(&mut tx, booking_id)
            .await?
            .ok_or(BookingError::NotScheduled(booking_id))?;
        tx.commit().await?;

        info!(
            booking_id,
            cancelled_by = ctx.user_id,
            student_id = cancelled.student_id,
            "Lesson cancelled"
        );

        let refund = self.refund(&cancelled).await;
        let calendar = self.remove_calendar_events(&cancelled).await;

        Ok(CancellationOutcome {
            booking: cancelled,
            refund,
            calendar,
        })
    }

    /// Give back what funded a cancelled lesson. Keyed by booking id, so a
    /// repeated call changes nothing.
    pub async fn refund(&self, lesson: &Booking) -> Refund {
        match self.try_refund(lesson).await {
            Ok(refund) => refund,
            Err(e) => {
                warn!(booking_id = lesson.id, error = %e, "Refund failed");
                Refund::Failed
            }
        }
    }

    async fn try_refund(&self, lesson: &Booking) -> Result<Refund, BookingError> {
        if lesson.is_trial {
            let mut tx = self.db.begin().await?;
            let posting =
                wallet::restore_trial_credit(&mut tx, lesson.student_id, &format!("trial-refund:{}", lesson.id))
                    .await?;
            tx.commit().await?;
            return Ok(if posting.was_applied() {
                Refund::TrialRestored
            } else {
                Refund::AlreadyRefunded
            });
        }

        let Some(funding_id) = lesson.funding_transaction_id else {
            return Err(BookingError::Inconsistency(format!(
                "paid booking {} has no funding transaction",
                lesson.id
            )));
        };
        let funding = wallet::get_transaction(self.db.pool(), funding_id).await?;
        let amount_cents = -funding.amount_cents;
        if amount_cents <= 0 || funding.student_id != lesson.student_id {
            error!(
                booking_id = lesson.id,
                transaction_id = funding_id,
                amount_cents = funding.amount_cents,
                "Funding transaction is not a debit of this student"
            );
            return Err(BookingError::Inconsistency(format!(
                "funding transaction {} does not match booking {}",
                funding_id, lesson.id
            )));
        }

        let posting = wallet::apply_credit(
            self.db.pool(),
            lesson.student_id,
            amount_cents,
            &format!("refund:{}", lesson.id),
            &format!("Refund for cancelled booking #{}", lesson.id),
        )
        .await?;

        Ok(match posting {
            Posting::Applied(row) => Refund::Credited {
                amount_cents,
                transaction_id: row.id,
            },
            Posting::AlreadyApplied(_) => Refund::AlreadyRefunded,
        })
    }

    async fn remove_calendar_events(&self, lesson: &Booking) -> CalendarCleanup {
        if lesson.teacher_calendar_event_id.is_none() && lesson.student_calendar_event_id.is_none() {
            return CalendarCleanup::NothingToRemove;
        }

        let calendar = self.calendar.clone();
        let detached = lesson.clone();
        match self
            .bounded_side_effect(async move { calendar.delete_lesson_events(&detached).await })
            .await
        {
            Some(Ok(Ok(events))) => CalendarCleanup::Removed { events },
            Some(Ok(Err(e))) => {
                warn!(booking_id = lesson.id, error = %e, "Calendar events not removed");
                CalendarCleanup::Failed
            }
            Some(Err(e)) => {
                warn!(booking_id = lesson.id, error = %e, "Calendar cleanup task failed");
                CalendarCleanup::Failed
            }
            None => CalendarCleanup::Pending,
        }
    }

    /// Mark one started lesson completed. Teacher of the lesson or admin only.
    pub async fn complete(&self, ctx: &RequestContext, booking_id: i64) -> Result<Booking, BookingError> {
        let existing = self.load_booking(booking_id).await?;
        if !(ctx.is_admin() || ctx.user_id == existing.teacher_id) {
            return Err(BookingError::Forbidden("only the teacher can complete a lesson"));
        }
        if existing.status != BookingStatus::Scheduled {
            return Err(BookingError::NotScheduled(booking_id));
        }
        if existing.lesson_date.and_time(existing.start_time) > ctx.now {
            return Err(ValidationError::NotStarted.into());
        }

        let completed = booking::complete_scheduled(self.db.pool(), booking_id)
            .await?
            .ok_or(BookingError::NotScheduled(booking_id))?;
        info!(booking_id, completed_by = ctx.user_id, "Lesson completed");
        Ok(completed)
    }

    /// Complete every scheduled lesson that ended at or before `now`.
    pub async fn complete_elapsed(&self, now: chrono::NaiveDateTime) -> Result<u64, BookingError> {
        let count = booking::complete_elapsed(self.db.pool(), now.date(), now.time()).await?;
        if count > 0 {
            info!(count, "Completed elapsed lessons");
        }
        Ok(count)
    }

    async fn load_booking(&self, booking_id: i64) -> Result<Booking, BookingError> {
        booking::get_booking(self.db.pool(), booking_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => BookingError::NotFound(booking_id),
                other => other.into(),
            })
    }
}

fn calendar_status(sync: &LessonSync) -> CalendarStatus {
    match sync.primary_event_id() {
        Some(id) => CalendarStatus::Synced {
            event_id: id.to_string(),
        },
        None if sync.nobody_connected() => CalendarStatus::NotConnected,
        None => CalendarStatus::Failed,
    }
}
