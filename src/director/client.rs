//! HTTP client for the director's read-only query endpoints.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, trace};

use super::Director;
use super::types::{Event, EventsFilter};
use crate::error::{DeployError, DirectorError, Result};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Director client over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpDirector {
    client: Client,
    base: Url,
    retry_delay: Duration,
}

impl HttpDirector {
    /// Creates a client for the director at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the HTTP client cannot be
    /// created.
    pub fn new(url: &str) -> Result<Self> {
        let base = Url::parse(url).map_err(|_| {
            DeployError::Director(DirectorError::InvalidUrl {
                url: url.to_string(),
            })
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| {
                DeployError::Director(DirectorError::Network {
                    message: format!("Failed to create HTTP client: {e}"),
                })
            })?;

        Ok(Self {
            client,
            base,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Overrides the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn get_events(&self, filter: &EventsFilter) -> Result<Vec<Event>> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.get_events_once(filter).await {
                Ok(events) => return Ok(events),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DeployError::Director(DirectorError::Network {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    async fn get_events_once(&self, filter: &EventsFilter) -> Result<Vec<Event>> {
        let mut url = self.base.join("events").map_err(|_| {
            DeployError::Director(DirectorError::InvalidUrl {
                url: self.base.to_string(),
            })
        })?;
        url.query_pairs_mut().extend_pairs(filter.query_pairs());
        trace!("Querying director events: {url}");

        let response = self.client.get(url).send().await.map_err(|e| {
            DeployError::Director(DirectorError::Network {
                message: format!("Request failed: {e}"),
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Director(DirectorError::Http {
                status: status.as_u16(),
                message: body,
            }));
        }

        response.json().await.map_err(|e| {
            DeployError::Director(DirectorError::InvalidResponse {
                message: format!("Failed to parse events: {e}"),
            })
        })
    }
}

#[async_trait]
impl Director for HttpDirector {
    async fn events(&self, filter: &EventsFilter) -> Result<Vec<Event>> {
        self.get_events(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "timestamp": 1_440_318_199,
            "user": "admin",
            "action": "delete",
            "object_type": "deployment",
            "object_name": "bosh"
        })
    }

    #[tokio::test]
    async fn test_events_sends_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(query_param("deployment", "bosh"))
            .and(query_param("before_id", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([event_json("9")])))
            .expect(1)
            .mount(&server)
            .await;

        let director = HttpDirector::new(&server.uri()).unwrap();
        let filter = EventsFilter {
            before_id: Some(String::from("10")),
            deployment: Some(String::from("bosh")),
            ..EventsFilter::default()
        };

        let events = director.events(&filter).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "9");
    }

    #[tokio::test]
    async fn test_http_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let director = HttpDirector::new(&server.uri())
            .unwrap()
            .with_retry_delay(Duration::from_millis(1));
        let err = director.events(&EventsFilter::default()).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Director(DirectorError::Http { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_director_is_retried() {
        let director = HttpDirector::new("http://127.0.0.1:1")
            .unwrap()
            .with_retry_delay(Duration::from_millis(1));
        let err = director.events(&EventsFilter::default()).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Director(DirectorError::Network { .. })
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HttpDirector::new("not a url"),
            Err(DeployError::Director(DirectorError::InvalidUrl { .. }))
        ));
    }
}
