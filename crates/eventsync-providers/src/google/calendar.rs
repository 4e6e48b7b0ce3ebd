//! Google Calendar API client.
//!
//! A thin HTTP client for the two endpoints the sync needs: paged
//! `events.list` and the `events.update`/`events.insert` pair used as an
//! upsert by event id.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::calendar::{BoxFuture, CalendarService};
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::payload::{EventPayload, OutboundEvent};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Events requested per page.
const PAGE_SIZE: usize = 250;

const PROVIDER_NAME: &str = "google";

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Creates a client authenticating with a bearer access token.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("eventsync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::configuration("failed to create HTTP client")
                    .with_provider(PROVIDER_NAME)
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Points the client at another API root (a proxy or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Updates the access token (after refresh).
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Lists every event of a calendar, following pagination.
    ///
    /// Items that do not decode as events are logged and dropped; the
    /// transformer never sees them.
    pub async fn list_events(&self, calendar_id: &str) -> ProviderResult<Vec<EventPayload>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, page_token.as_deref())
                .await?;

            for item in page.items {
                match serde_json::from_value::<EventPayload>(item) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(calendar_id, error = %e, "dropping undecodable event"),
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "listed remote events");
        Ok(events)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let mut request = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(&self.access_token)
            .query(&[("maxResults", PAGE_SIZE.to_string())]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse event list: {}", e))
                .with_provider(PROVIDER_NAME)
        })
    }

    /// Writes an event under its id, creating it when it does not exist yet.
    ///
    /// Update is tried first. A 404 falls through to insert; a 409 on insert
    /// means a concurrent write created it in between, so update runs again.
    pub async fn upsert_event(&self, outbound: &OutboundEvent) -> ProviderResult<EventPayload> {
        let event_id = outbound.event_id().ok_or_else(|| {
            ProviderError::bad_request("outbound event has no id").with_provider(PROVIDER_NAME)
        })?;

        match self.update_event(&outbound.calendar_id, event_id, &outbound.event).await {
            Err(e) if e.code() == ProviderErrorCode::NotFound => {
                debug!(event_id, "remote event missing, inserting");
                match self.insert_event(&outbound.calendar_id, &outbound.event).await {
                    Err(e) if e.code() == ProviderErrorCode::Conflict => {
                        self.update_event(&outbound.calendar_id, event_id, &outbound.event)
                            .await
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &EventPayload,
    ) -> ProviderResult<EventPayload> {
        let request = self
            .http_client
            .put(self.event_url(calendar_id, event_id))
            .bearer_auth(&self.access_token)
            .json(event);
        self.execute_event(request).await
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &EventPayload,
    ) -> ProviderResult<EventPayload> {
        let request = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(&self.access_token)
            .json(event);
        self.execute_event(request).await
    }

    async fn execute_event(&self, request: reqwest::RequestBuilder) -> ProviderResult<EventPayload> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse event: {}", e))
                .with_provider(PROVIDER_NAME)
        })
    }

    /// Sends a request and returns the body of a successful response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> ProviderResult<String> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            ProviderError::network(message).with_provider(PROVIDER_NAME)
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e))
                .with_provider(PROVIDER_NAME)
        })?;

        check_status(status, retry_after, &body).map_err(|e| e.with_provider(PROVIDER_NAME))?;
        Ok(body)
    }
}

/// Maps an HTTP status to a provider error.
///
/// Google reports quota exhaustion as 403 with a `rateLimitExceeded` reason,
/// which is retryable unlike other 403s.
fn check_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> ProviderResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded")));
    if rate_limited {
        return Err(ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }

    Err(match status {
        StatusCode::UNAUTHORIZED => ProviderError::authentication("access token expired or invalid"),
        StatusCode::FORBIDDEN => ProviderError::authorization("access denied to calendar"),
        StatusCode::NOT_FOUND => ProviderError::not_found("calendar or event not found"),
        StatusCode::CONFLICT => ProviderError::conflict("event id already exists"),
        s if s.is_server_error() => ProviderError::server(format!("API error ({}): {}", s, body)),
        s => ProviderError::bad_request(format!("API error ({}): {}", s, body)),
    })
}

impl CalendarService for GoogleCalendarClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventPayload>>> {
        Box::pin(GoogleCalendarClient::list_events(self, calendar_id))
    }

    fn upsert_event<'a>(
        &'a self,
        outbound: &'a OutboundEvent,
    ) -> BoxFuture<'a, ProviderResult<EventPayload>> {
        Box::pin(GoogleCalendarClient::upsert_event(self, outbound))
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}
