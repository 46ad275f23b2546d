use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use taskforge_core::TaskforgeError;
use url::Url;

use crate::traits::{BackendError, NewRemoteTask, RemoteComment, RemoteTask, TaskBackend};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Async HTTP client for the external task backend.
pub struct HttpBackend {
    base_url: String,
    client: Client,
    api_token: Option<String>,
}

impl HttpBackend {
    /// `base_url` must be an absolute http(s) URL.
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, TaskforgeError> {
        let parsed = Url::parse(base_url).map_err(|e| {
            TaskforgeError::ConfigurationMissing(format!("invalid backend url '{base_url}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TaskforgeError::ConfigurationMissing(format!(
                "backend url '{base_url}' must use http or https"
            )));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            api_token: api_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    /// Check if the backend is reachable. Not authenticated.
    pub async fn health_check(&self) -> Result<(), BackendError> {
        let resp = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(parse_error(resp).await)
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let builder = self.client.get(format!("{}{path}", self.base_url));
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(resp).await
    }

    async fn send_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        body: &B,
    ) -> Result<T, BackendError> {
        let resp = self
            .with_auth(builder.json(body))
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(std::time::Duration::ZERO)
    } else if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else {
        BackendError::Connection(err.to_string())
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, BackendError> {
    if resp.status().is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    } else {
        Err(parse_error(resp).await)
    }
}

/// `Retry-After` as delta-seconds or an HTTP-date. A date in the past
/// means no wait.
fn retry_after_secs(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - now;
    Some(wait.num_seconds().max(0) as u64)
}

async fn parse_error(resp: reqwest::Response) -> BackendError {
    let status = resp.status();
    let retry_after_secs = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| retry_after_secs(v, Utc::now()));
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        BackendError::RateLimited { retry_after_secs }
    } else if status.is_server_error() {
        BackendError::Unavailable {
            status: status.as_u16(),
            message,
        }
    } else if status == StatusCode::NOT_FOUND {
        BackendError::NotFound(message)
    } else {
        BackendError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn create_task(
        &self,
        project_id: &str,
        task: &NewRemoteTask,
        idempotency_key: &str,
    ) -> Result<RemoteTask, BackendError> {
        let builder = self
            .client
            .post(self.url(&format!("/api/projects/{project_id}/tasks")))
            .header(IDEMPOTENCY_HEADER, idempotency_key);
        self.send_json(builder, task).await
    }

    async fn get_task(&self, id: &str) -> Result<RemoteTask, BackendError> {
        self.get_json(&format!("/api/tasks/{id}")).await
    }

    async fn update_owner(&self, id: &str, owner: &str) -> Result<RemoteTask, BackendError> {
        let builder = self.client.put(self.url(&format!("/api/tasks/{id}/owner")));
        self.send_json(builder, &serde_json::json!({ "owner": owner }))
            .await
    }

    async fn move_column(&self, id: &str, column_id: &str) -> Result<RemoteTask, BackendError> {
        let builder = self.client.put(self.url(&format!("/api/tasks/{id}/column")));
        self.send_json(builder, &serde_json::json!({ "column_id": column_id }))
            .await
    }

    async fn add_comment(&self, id: &str, body: &str) -> Result<RemoteComment, BackendError> {
        let builder = self
            .client
            .post(self.url(&format!("/api/tasks/{id}/comments")));
        self.send_json(builder, &serde_json::json!({ "body": body }))
            .await
    }

    async fn list_tasks(&self, project_id: &str) -> Result<Vec<RemoteTask>, BackendError> {
        self.get_json(&format!("/api/projects/{project_id}/tasks"))
            .await
    }
}
