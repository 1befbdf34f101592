//! Agent client over the HTTPS message bus.
//!
//! Requests are posted to `<mbus>/agent` as `{method, arguments, reply_to}`
//! with basic auth taken from the message bus URL. Long-running methods
//! answer with an `agent_task_id` that is polled with `get_task`.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{AgentClient, AgentClientFactory};
use crate::error::{AgentError, DeployError, Result};

/// Timeout for a single agent request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    method: &'a str,
    arguments: Vec<Value>,
    reply_to: &'a str,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    exception: Option<AgentException>,
}

#[derive(Debug, Deserialize)]
struct AgentException {
    message: String,
}

/// Polling behaviour for long-running agent tasks.
#[derive(Debug, Clone, Copy)]
pub struct TaskPolling {
    /// Delay between `get_task` calls.
    pub delay: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for TaskPolling {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Parsed message bus endpoint.
#[derive(Debug, Clone)]
struct Endpoint {
    url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl Endpoint {
    fn parse(mbus_url: &str) -> std::result::Result<Self, String> {
        let mut url = Url::parse(mbus_url).map_err(|e| e.to_string())?;
        let username = (!url.username().is_empty()).then(|| url.username().to_string());
        let password = url.password().map(ToString::to_string);
        url.set_username("").map_err(|()| String::from("cannot strip username"))?;
        url.set_password(None).map_err(|()| String::from("cannot strip password"))?;
        let url = url.join("agent").map_err(|e| e.to_string())?;
        Ok(Self {
            url,
            username,
            password,
        })
    }
}

/// [`AgentClient`] speaking HTTP to the agent's message bus.
#[derive(Debug)]
pub struct HttpAgentClient {
    http: Client,
    endpoint: std::result::Result<Endpoint, String>,
    director_id: String,
    polling: TaskPolling,
}

impl HttpAgentClient {
    /// Creates a client for `mbus_url`.
    ///
    /// Never fails: a malformed URL is reported by every call instead.
    #[must_use]
    pub fn new(director_id: &str, mbus_url: &str, polling: TaskPolling) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap_or_default();

        Self {
            http,
            endpoint: Endpoint::parse(mbus_url),
            director_id: director_id.to_string(),
            polling,
        }
    }

    async fn send(&self, method: &str, arguments: Vec<Value>) -> Result<Value> {
        let endpoint = self.endpoint.as_ref().map_err(|message| {
            DeployError::Agent(AgentError::Network {
                method: method.to_string(),
                message: format!("invalid message bus URL: {message}"),
            })
        })?;

        debug!(method, url = %endpoint.url, "Sending agent request");

        let mut request = self.http.post(endpoint.url.clone()).json(&AgentRequest {
            method,
            arguments,
            reply_to: &self.director_id,
        });
        if let Some(username) = &endpoint.username {
            request = request.basic_auth(username, endpoint.password.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            DeployError::Agent(AgentError::Network {
                method: method.to_string(),
                message: e.to_string(),
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::Agent(AgentError::Http {
                method: method.to_string(),
                status: status.as_u16(),
            }));
        }

        let body: AgentResponse = response.json().await.map_err(|e| {
            DeployError::Agent(AgentError::InvalidResponse {
                method: method.to_string(),
                message: e.to_string(),
            })
        })?;

        if let Some(exception) = body.exception {
            return Err(DeployError::Agent(AgentError::Exception {
                method: method.to_string(),
                message: exception.message,
            }));
        }

        Ok(body.value)
    }

    /// Sends a long-running method and waits for its task to finish.
    async fn send_and_wait(&self, method: &str, arguments: Vec<Value>) -> Result<Value> {
        let mut value = self.send(method, arguments).await?;
        let Some(task_id) = task_id(&value) else {
            return Ok(value);
        };

        let started = Instant::now();
        while is_running(&value) {
            if started.elapsed() >= self.polling.timeout {
                return Err(DeployError::Agent(AgentError::Timeout {
                    method: method.to_string(),
                    secs: self.polling.timeout.as_secs(),
                }));
            }

            tokio::time::sleep(self.polling.delay).await;
            debug!(method, task_id = %task_id, "Polling agent task");
            value = self.send("get_task", vec![Value::from(task_id.clone())]).await?;
        }

        Ok(value)
    }
}

fn task_id(value: &Value) -> Option<String> {
    value
        .get("agent_task_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn is_running(value: &Value) -> bool {
    value.get("state").and_then(Value::as_str) == Some("running")
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn ping(&self) -> Result<String> {
        let value = self.send("ping", Vec::new()).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn stop(&self) -> Result<()> {
        info!("Stopping jobs through agent");
        self.send_and_wait("stop", Vec::new()).await?;
        Ok(())
    }

    async fn list_disk(&self) -> Result<Vec<String>> {
        let value = self.send("list_disk", Vec::new()).await?;
        serde_json::from_value(value).map_err(|e| {
            DeployError::Agent(AgentError::InvalidResponse {
                method: String::from("list_disk"),
                message: e.to_string(),
            })
        })
    }

    async fn unmount_disk(&self, disk_cid: &str) -> Result<()> {
        info!(disk_cid, "Unmounting disk through agent");
        self.send_and_wait("unmount_disk", vec![Value::from(disk_cid)])
            .await?;
        Ok(())
    }
}

/// [`AgentClientFactory`] building [`HttpAgentClient`]s.
#[derive(Debug, Default)]
pub struct HttpAgentClientFactory {
    polling: TaskPolling,
}

impl HttpAgentClientFactory {
    /// Creates a factory whose clients poll tasks with `polling`.
    #[must_use]
    pub const fn new(polling: TaskPolling) -> Self {
        Self { polling }
    }
}

impl AgentClientFactory for HttpAgentClientFactory {
    fn new_agent_client(&self, director_id: &str, mbus_url: &str) -> Arc<dyn AgentClient> {
        Arc::new(HttpAgentClient::new(director_id, mbus_url, self.polling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_polling() -> TaskPolling {
        TaskPolling {
            delay: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }

    fn mbus(server: &MockServer) -> String {
        server.uri().replacen("http://", "http://mbus:secret@", 1)
    }

    #[tokio::test]
    async fn test_ping_sends_credentials_and_reply_to() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .and(wiremock::matchers::basic_auth("mbus", "secret"))
            .and(body_partial_json(json!({ "method": "ping", "reply_to": "abc123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "pong" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAgentClient::new("abc123", &mbus(&server), fast_polling());
        assert_eq!(client.ping().await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_stop_polls_task_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "stop" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "value": { "agent_task_id": "t-1", "state": "running" } }),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "get_task", "arguments": ["t-1"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "value": { "agent_task_id": "t-1", "state": "running" } }),
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "get_task" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "stopped" })))
            .mount(&server)
            .await;

        let client = HttpAgentClient::new("abc123", &mbus(&server), fast_polling());
        client.stop().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn test_exception_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "exception": { "message": "disk busy" } })),
            )
            .mount(&server)
            .await;

        let client = HttpAgentClient::new("abc123", &mbus(&server), fast_polling());
        let err = client.unmount_disk("disk-1").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Agent error: Agent 'unmount_disk' responded with exception: disk busy"
        );
    }

    #[tokio::test]
    async fn test_list_disk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "value": ["disk-1", "disk-2"] })),
            )
            .mount(&server)
            .await;

        let client = HttpAgentClient::new("abc123", &mbus(&server), fast_polling());
        assert_eq!(client.list_disk().await.unwrap(), vec!["disk-1", "disk-2"]);
    }

    #[tokio::test]
    async fn test_malformed_url_fails_per_call() {
        let client = HttpAgentClient::new("abc123", "not a url", fast_polling());
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, DeployError::Agent(AgentError::Network { .. })));
    }
}
