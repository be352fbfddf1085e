use async_trait::async_trait;
use serde::Deserialize;

use zapship_core::models::TrackingUpdate;
use zapship_core::AppError;

/// Looks up the latest movement of a tracking code.
///
/// Never fails from the caller's point of view: any API problem collapses
/// into the `erro_api` sentinel update, which the poll records like any other
/// status so the order keeps its check bookkeeping.
#[async_trait]
pub trait Tracker: Send + Sync {
    async fn track(&self, api_key: &str, code: &str) -> TrackingUpdate;
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    #[serde(default)]
    events: Vec<TrackEvent>,
}

/// One movement event. The API reports the newest first.
#[derive(Debug, Deserialize)]
struct TrackEvent {
    status: Option<String>,
    location: Option<String>,
    date: Option<String>,
    time: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    description: Option<String>,
}

/// HTTP client for the carrier tracking API.
pub struct TrackingClient {
    http: reqwest::Client,
    api_url: String,
}

impl TrackingClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    async fn request(&self, api_key: &str, code: &str) -> Result<TrackResponse, reqwest::Error> {
        self.http
            .post(&self.api_url)
            .header("Authorization", format!("Apikey {api_key}"))
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Tracker for TrackingClient {
    #[tracing::instrument(skip(self, api_key))]
    async fn track(&self, api_key: &str, code: &str) -> TrackingUpdate {
        let response = match self.request(api_key, code).await {
            Ok(response) => response,
            Err(e) => {
                let err = AppError::Tracking(e.to_string());
                tracing::warn!(error = %err, "Tracking API call failed");
                return TrackingUpdate::api_error();
            }
        };

        let Some(event) = response.events.into_iter().next() else {
            // A code with no movements yet is indistinguishable from a bad
            // one; treat it like a failed lookup.
            return TrackingUpdate::api_error();
        };

        let Some(status) = event.status.filter(|s| !s.is_empty()) else {
            return TrackingUpdate::api_error();
        };

        let last_update = match (event.date.as_deref(), event.time.as_deref()) {
            (Some(date), Some(time)) => Some(format!("{date} {time}")),
            (Some(date), None) => Some(date.to_string()),
            _ => None,
        };

        TrackingUpdate {
            status,
            location: event.location,
            last_update,
            origin_location: event.origin,
            destination_location: event.destination,
            last_event_description: event.description,
        }
    }
}
