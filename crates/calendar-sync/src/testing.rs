//! In-memory provider for tests of code built on calendar sync.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CalendarError;
use crate::provider::{CalendarProvider, LessonEvent, TokenGrant};

/// What a [`RecordingProvider`] saw.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    /// `(access token, event id, event)` per created event.
    pub created: Vec<(String, String, LessonEvent)>,
    pub updated: Vec<(String, LessonEvent)>,
    pub deleted: Vec<String>,
    pub refreshes: usize,
}

#[derive(Debug, Default)]
struct Behaviour {
    fail_events: bool,
    fail_refresh: bool,
    delay: Option<Duration>,
}

/// Provider that keeps events in memory and can be told to fail or stall.
#[derive(Debug, Default)]
pub struct RecordingProvider {
    recorded: Mutex<Recorded>,
    behaviour: Mutex<Behaviour>,
    next_id: Mutex<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every event call fail with a 500 response.
    pub fn fail_events(&self, fail: bool) {
        lock(&self.behaviour).fail_events = fail;
    }

    /// Make token refresh fail with a 400 response.
    pub fn fail_refresh(&self, fail: bool) {
        lock(&self.behaviour).fail_refresh = fail;
    }

    /// Sleep before answering every event call.
    pub fn delay(&self, delay: Option<Duration>) {
        lock(&self.behaviour).delay = delay;
    }

    pub fn recorded(&self) -> Recorded {
        lock(&self.recorded).clone()
    }

    async fn before_event_call(&self) -> Result<(), CalendarError> {
        let (delay, fail) = {
            let behaviour = lock(&self.behaviour);
            (behaviour.delay, behaviour.fail_events)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(CalendarError::Provider {
                status: 500,
                message: "backend error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for RecordingProvider {
    fn authorization_url(&self, state: &str) -> Result<String, CalendarError> {
        Ok(format!("https://calendar.test/auth?state={}", urlencoding::encode(state)))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, CalendarError> {
        if code.is_empty() {
            return Err(CalendarError::Provider {
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(TokenGrant {
            access_token: format!("access-{}", code),
            refresh_token: Some(format!("refresh-{}", code)),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, CalendarError> {
        let fail = lock(&self.behaviour).fail_refresh;
        lock(&self.recorded).refreshes += 1;
        if fail {
            return Err(CalendarError::Provider {
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(TokenGrant {
            access_token: format!("refreshed-{}", refresh_token),
            refresh_token: None,
            expires_in: 3600,
        })
    }

    async fn create_event(&self, access_token: &str, event: &LessonEvent) -> Result<String, CalendarError> {
        self.before_event_call().await?;
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            format!("evt-{}", *next)
        };
        lock(&self.recorded)
            .created
            .push((access_token.to_string(), id.clone(), event.clone()));
        Ok(id)
    }

    async fn update_event(
        &self,
        _access_token: &str,
        event_id: &str,
        event: &LessonEvent,
    ) -> Result<(), CalendarError> {
        self.before_event_call().await?;
        lock(&self.recorded)
            .updated
            .push((event_id.to_string(), event.clone()));
        Ok(())
    }

    async fn delete_event(&self, _access_token: &str, event_id: &str) -> Result<(), CalendarError> {
        self.before_event_call().await?;
        lock(&self.recorded).deleted.push(event_id.to_string());
        Ok(())
    }
}
