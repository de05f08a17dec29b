//! REST client for a Google-Calendar-shaped provider.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CalendarConfig;
use crate::error::CalendarError;
use crate::provider::{CalendarProvider, LessonEvent, TokenGrant};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

/// Calendar provider speaking OAuth2 + the Calendar v3 REST API.
#[derive(Clone)]
pub struct HttpCalendarProvider {
    http: Client,
    config: CalendarConfig,
}

impl HttpCalendarProvider {
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    fn event_body<'a>(&self, event: &'a LessonEvent) -> EventBody<'a> {
        let at = |time: chrono::NaiveTime| EventTime {
            date_time: event.date.and_time(time).format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: self.config.time_zone.clone(),
        };
        EventBody {
            summary: &event.summary,
            description: &event.description,
            start: at(event.start),
            end: at(event.end),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, CalendarError> {
        let resp = self.http.post(&self.config.token_url).form(form).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<TokenGrant>().await?)
    }
}

/// Turn a non-success response into `CalendarError::Provider`.
async fn check_status(resp: Response) -> Result<Response, CalendarError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(CalendarError::Provider {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CalendarProvider for HttpCalendarProvider {
    fn authorization_url(&self, state: &str) -> Result<String, CalendarError> {
        Ok(self.config.authorization_url(state))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, CalendarError> {
        debug!("Exchanging authorization code");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, CalendarError> {
        debug!("Refreshing access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }

    async fn create_event(&self, access_token: &str, event: &LessonEvent) -> Result<String, CalendarError> {
        let resp = self
            .http
            .post(self.config.events_url())
            .bearer_auth(access_token)
            .json(&self.event_body(event))
            .send()
            .await?;
        let created: CreatedEvent = check_status(resp).await?.json().await?;
        debug!(event_id = %created.id, "Created calendar event");
        Ok(created.id)
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &LessonEvent,
    ) -> Result<(), CalendarError> {
        let resp = self
            .http
            .patch(self.config.event_url(event_id))
            .bearer_auth(access_token)
            .json(&self.event_body(event))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<(), CalendarError> {
        let resp = self
            .http
            .delete(self.config.event_url(event_id))
            .bearer_auth(access_token)
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!(event_id, "Calendar event already gone");
                Ok(())
            }
            _ => {
                check_status(resp).await?;
                Ok(())
            }
        }
    }
}
