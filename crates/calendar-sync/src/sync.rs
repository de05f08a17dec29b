//! Per-user token lifecycle and lesson event sync.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use database::models::CalendarAccountStatus;
use database::{booking, calendar_account, Booking, Database};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CalendarError;
use crate::provider::{CalendarProvider, DisabledProvider, LessonEvent, TokenGrant};

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Connection state of a user's calendar account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Disconnected,
    Connected,
    TokenExpired,
    /// Terminal until the user authorizes again.
    Revoked,
}

/// Result of syncing one lesson to both participants' calendars.
#[derive(Debug)]
pub struct LessonSync {
    pub teacher: Result<String, CalendarError>,
    pub student: Result<String, CalendarError>,
}

impl LessonSync {
    /// Teacher's event id if created, else the student's.
    pub fn primary_event_id(&self) -> Option<&str> {
        self.teacher
            .as_deref()
            .ok()
            .or_else(|| self.student.as_deref().ok())
    }

    /// Neither participant has a usable calendar connection.
    pub fn nobody_connected(&self) -> bool {
        let absent = |r: &Result<String, CalendarError>| {
            matches!(r, Err(CalendarError::NotConnected(_)) | Err(CalendarError::Disabled))
        };
        absent(&self.teacher) && absent(&self.student)
    }
}

/// Calendar sync bound to the credential store.
#[derive(Clone)]
pub struct CalendarSync {
    db: Database,
    provider: Arc<dyn CalendarProvider>,
    timeout: Duration,
}

impl CalendarSync {
    pub fn new(db: Database, provider: Arc<dyn CalendarProvider>, timeout: Duration) -> Self {
        Self { db, provider, timeout }
    }

    /// Sync that reports every account as unusable.
    pub fn disabled(db: Database) -> Self {
        Self::new(db, Arc::new(DisabledProvider), Duration::from_secs(1))
    }

    pub fn provider(&self) -> &Arc<dyn CalendarProvider> {
        &self.provider
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CalendarError>
    where
        F: Future<Output = Result<T, CalendarError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CalendarError::Timeout)?
    }

    /// Current state of a user's account.
    pub async fn account_state(&self, user_id: i64) -> Result<AccountState, CalendarError> {
        let state = match calendar_account::get_account(self.db.pool(), user_id).await? {
            None => AccountState::Disconnected,
            Some(account) if account.status == CalendarAccountStatus::Revoked => AccountState::Revoked,
            Some(account) => {
                if account.expires_at <= Utc::now() + chrono::Duration::seconds(EXPIRY_SKEW_SECS) {
                    AccountState::TokenExpired
                } else {
                    AccountState::Connected
                }
            }
        };
        Ok(state)
    }

    /// A usable access token, refreshing once if the stored one expired.
    ///
    /// A failed refresh marks the account revoked.
    pub async fn access_token(&self, user_id: i64) -> Result<String, CalendarError> {
        let account = calendar_account::get_account(self.db.pool(), user_id)
            .await?
            .ok_or(CalendarError::NotConnected(user_id))?;

        if account.status == CalendarAccountStatus::Revoked {
            return Err(CalendarError::Revoked(user_id));
        }

        if account.expires_at > Utc::now() + chrono::Duration::seconds(EXPIRY_SKEW_SECS) {
            return Ok(account.access_token);
        }

        debug!(user_id, "Calendar token expired, refreshing");
        let grant = match self.bounded(self.provider.refresh(&account.refresh_token)).await {
            Ok(grant) => grant,
            Err(CalendarError::Disabled) => return Err(CalendarError::Disabled),
            Err(e) => {
                warn!(user_id, error = %e, "Calendar token refresh failed, revoking account");
                calendar_account::mark_revoked(self.db.pool(), user_id).await?;
                return Err(CalendarError::RefreshFailed {
                    user_id,
                    reason: e.to_string(),
                });
            }
        };

        self.store_refreshed(user_id, &grant).await?;
        Ok(grant.access_token)
    }

    async fn store_refreshed(&self, user_id: i64, grant: &TokenGrant) -> Result<(), CalendarError> {
        let expires_at = Utc::now() + chrono::Duration::seconds(grant.expires_in);
        calendar_account::update_access_token(
            self.db.pool(),
            user_id,
            &grant.access_token,
            grant.refresh_token.as_deref(),
            expires_at,
        )
        .await?;
        info!(user_id, "Calendar token refreshed");
        Ok(())
    }

    /// Create an event in one user's calendar.
    pub async fn create_event(&self, user_id: i64, event: &LessonEvent) -> Result<String, CalendarError> {
        let token = self.access_token(user_id).await?;
        self.bounded(self.provider.create_event(&token, event)).await
    }

    /// Update an event in one user's calendar.
    pub async fn update_event(
        &self,
        user_id: i64,
        event_id: &str,
        event: &LessonEvent,
    ) -> Result<(), CalendarError> {
        let token = self.access_token(user_id).await?;
        self.bounded(self.provider.update_event(&token, event_id, event)).await
    }

    /// Delete an event from one user's calendar.
    pub async fn delete_event(&self, user_id: i64, event_id: &str) -> Result<(), CalendarError> {
        let token = self.access_token(user_id).await?;
        self.bounded(self.provider.delete_event(&token, event_id)).await
    }

    /// Create the lesson event in the teacher's and the student's calendar
    /// and store the ids that were created. The two sides are independent.
    pub async fn create_lesson_events(&self, lesson: &Booking) -> LessonSync {
        let event = LessonEvent::for_booking(lesson);
        let (teacher, student) = tokio::join!(
            self.create_event(lesson.teacher_id, &event),
            self.create_event(lesson.student_id, &event),
        );

        for (side, result) in [("teacher", &teacher), ("student", &student)] {
            match result {
                Ok(id) => debug!(booking_id = lesson.id, side, event_id = %id, "Lesson event created"),
                Err(CalendarError::NotConnected(_)) | Err(CalendarError::Disabled) => {}
                Err(e) => warn!(booking_id = lesson.id, side, error = %e, "Lesson event not created"),
            }
        }

        let sync = LessonSync { teacher, student };
        if sync.teacher.is_ok() || sync.student.is_ok() {
            match booking::set_calendar_event_ids(
                self.db.pool(),
                lesson.id,
                sync.teacher.as_deref().ok(),
                sync.student.as_deref().ok(),
            )
            .await
            {
                Ok(true) => {}
                // Cancelled while the events were being created. Cancellation
                // saw no ids, so the events are removed here.
                Ok(false) => self.discard_lesson_events(lesson, &sync).await,
                Err(e) => warn!(booking_id = lesson.id, error = %e, "Failed to store lesson event ids"),
            }
        }
        sync
    }

    async fn discard_lesson_events(&self, lesson: &Booking, sync: &LessonSync) {
        info!(booking_id = lesson.id, "Lesson no longer scheduled, removing new events");
        let sides = [
            (lesson.teacher_id, sync.teacher.as_deref().ok()),
            (lesson.student_id, sync.student.as_deref().ok()),
        ];
        for (user_id, event_id) in sides {
            let Some(event_id) = event_id else { continue };
            if let Err(e) = self.delete_event(user_id, event_id).await {
                warn!(booking_id = lesson.id, user_id, error = %e, "Orphaned lesson event not deleted");
            }
        }
    }

    /// Push the current timing of a lesson to both stored events.
    pub async fn update_lesson_events(&self, lesson: &Booking) -> Result<(), CalendarError> {
        let event = LessonEvent::for_booking(lesson);
        if let Some(id) = &lesson.teacher_calendar_event_id {
            self.update_event(lesson.teacher_id, id, &event).await?;
        }
        if let Some(id) = &lesson.student_calendar_event_id {
            self.update_event(lesson.student_id, id, &event).await?;
        }
        Ok(())
    }

    /// Delete both stored events of a lesson. Returns how many were removed.
    ///
    /// The stored ids are cleared only when every delete succeeded, so a
    /// failed side can be retried.
    pub async fn delete_lesson_events(&self, lesson: &Booking) -> Result<usize, CalendarError> {
        let mut deleted = 0;
        let mut last_error = None;

        let sides = [
            (lesson.teacher_id, lesson.teacher_calendar_event_id.as_deref()),
            (lesson.student_id, lesson.student_calendar_event_id.as_deref()),
        ];
        for (user_id, event_id) in sides {
            let Some(event_id) = event_id else { continue };
            match self.delete_event(user_id, event_id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(booking_id = lesson.id, user_id, error = %e, "Lesson event not deleted");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            return Err(e);
        }
        if deleted > 0 {
            booking::clear_calendar_event_ids(self.db.pool(), lesson.id).await?;
        }
        Ok(deleted)
    }
}
