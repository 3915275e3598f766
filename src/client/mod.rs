//! Blocking HTTP client for the control API, plus the wait-for-completion loop.

mod wait;

pub use wait::{wait_for_completion, WaitOptions, WaitReport, WaitTracker};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::{SessionId, SessionRole, SessionStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A session as reported by `GET /sessions`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSession {
    pub id: SessionId,
    pub name: String,
    pub directory: PathBuf,
    pub mcp_port: u16,
    pub role: SessionRole,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct RemoteSessionList {
    sessions: Vec<RemoteSession>,
}

/// Body of `GET /sessions/{id}/output`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteOutput {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub output: String,
    #[serde(default)]
    pub awaiting_input: bool,
}

fn format_http_error(code: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {code}");
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return format!("HTTP {code}: {body}");
    };

    let error = value
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("http_error");
    match value.get("message").and_then(|v| v.as_str()) {
        Some(message) => format!("HTTP {code} {error}: {message}"),
        None => format!("HTTP {code} {error}"),
    }
}

/// Talks to a running conductor over its loopback control API
#[derive(Clone)]
pub struct ControlClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ControlClient {
    /// Client for the control API on 127.0.0.1:`port`
    pub fn new(port: u16) -> Self {
        Self::with_base_url(format!("http://127.0.0.1:{port}"))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call(
        &self,
        request: ureq::Request,
        payload: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let result = match payload {
            Some(payload) => request
                .set("Content-Type", "application/json")
                .send_string(
                    &serde_json::to_string(&payload)
                        .context("Failed to serialize request JSON")?,
                ),
            None => request.call(),
        };

        let resp = result.map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                anyhow::anyhow!(format_http_error(code, &body))
            }
            other => anyhow::anyhow!(other),
        })?;

        let body = resp.into_string().context("Failed to read response body")?;
        serde_json::from_str(&body).context("Failed to parse JSON response")
    }

    fn get(&self, path: &str) -> Result<serde_json::Value> {
        self.call(self.agent.get(&format!("{}{}", self.base_url, path)), None)
    }

    fn post(&self, path: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        self.call(
            self.agent.post(&format!("{}{}", self.base_url, path)),
            Some(payload),
        )
    }

    fn delete(&self, path: &str) -> Result<serde_json::Value> {
        self.call(self.agent.delete(&format!("{}{}", self.base_url, path)), None)
    }

    pub fn ping(&self) -> Result<serde_json::Value> {
        self.get("/ping")
    }

    pub fn list_sessions(&self) -> Result<Vec<RemoteSession>> {
        let value = self.get("/sessions")?;
        let list: RemoteSessionList =
            serde_json::from_value(value).context("Invalid /sessions response")?;
        Ok(list.sessions)
    }

    pub fn create_session(
        &self,
        name: &str,
        directory: &str,
        mcp_port: Option<u16>,
        role: Option<&str>,
        initial_prompt: Option<&str>,
    ) -> Result<serde_json::Value> {
        let mut payload = serde_json::json!({ "name": name, "directory": directory });
        if let Some(port) = mcp_port {
            payload["mcp_port"] = port.into();
        }
        if let Some(role) = role {
            payload["role"] = role.into();
        }
        if let Some(prompt) = initial_prompt {
            payload["initial_prompt"] = prompt.into();
        }
        self.post("/sessions", payload)
    }

    pub fn send(&self, id: SessionId, message: &str) -> Result<serde_json::Value> {
        self.post(
            &format!("/sessions/{id}/send"),
            serde_json::json!({ "message": message }),
        )
    }

    pub fn broadcast(&self, message: &str) -> Result<serde_json::Value> {
        self.post("/broadcast", serde_json::json!({ "message": message }))
    }

    pub fn output(&self, id: SessionId, lines: Option<usize>) -> Result<RemoteOutput> {
        let path = match lines {
            Some(lines) => format!("/sessions/{id}/output?lines={lines}"),
            None => format!("/sessions/{id}/output"),
        };
        let value = self.get(&path)?;
        serde_json::from_value(value).context("Invalid output response")
    }

    pub fn delete_session(&self, id: SessionId) -> Result<serde_json::Value> {
        self.delete(&format!("/sessions/{id}"))
    }

    pub fn start_session(&self, id: SessionId) -> Result<serde_json::Value> {
        self.post(&format!("/sessions/{id}/start"), serde_json::json!({}))
    }

    pub fn stop_session(&self, id: SessionId) -> Result<serde_json::Value> {
        self.post(&format!("/sessions/{id}/stop"), serde_json::json!({}))
    }

    pub fn tasks(&self, session: Option<SessionId>) -> Result<serde_json::Value> {
        match session {
            Some(id) => self.get(&format!("/tasks?session={id}")),
            None => self.get("/tasks"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_http_error() {
        assert_eq!(format_http_error(404, ""), "HTTP 404");
        assert_eq!(
            format_http_error(
                400,
                r#"{"error":"validation_error","message":"directory is required"}"#
            ),
            "HTTP 400 validation_error: directory is required"
        );
        assert_eq!(format_http_error(404, r#"{"error":"not_found"}"#), "HTTP 404 not_found");
        assert_eq!(format_http_error(500, "oops"), "HTTP 500: oops");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ControlClient::with_base_url("http://127.0.0.1:9880/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9880");
    }
}
