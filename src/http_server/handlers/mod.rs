//! Route table and request handlers of the control API.

mod dispatch;
mod misc;
mod sessions;

use super::types::ApiResponse;
use crate::{Conductor, SessionId};

/// A matched (verb, path-shape) pair. Session routes carry the raw id segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Ping,
    ListSessions,
    CreateSession,
    SendMessage(&'a str),
    GetOutput(&'a str),
    DeleteSession(&'a str),
    StartSession(&'a str),
    StopSession(&'a str),
    Broadcast,
    AllOutputs,
    ListTasks,
    NotFound,
}

/// Match a request against the route table
pub fn route<'a>(method: &str, path: &'a str) -> Route<'a> {
    let segments: Vec<&'a str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        ("GET", ["ping"]) => Route::Ping,
        ("GET", ["sessions"]) => Route::ListSessions,
        ("POST", ["sessions"]) => Route::CreateSession,
        ("POST", ["sessions", id, "send"]) => Route::SendMessage(id),
        ("GET", ["sessions", id, "output"]) => Route::GetOutput(id),
        ("DELETE", ["sessions", id]) => Route::DeleteSession(id),
        ("POST", ["sessions", id, "start"]) => Route::StartSession(id),
        ("POST", ["sessions", id, "stop"]) => Route::StopSession(id),
        ("POST", ["broadcast"]) => Route::Broadcast,
        ("GET", ["outputs"]) => Route::AllOutputs,
        ("GET", ["tasks"]) => Route::ListTasks,
        _ => Route::NotFound,
    }
}

/// Handle one request. `url` may carry a query string.
pub fn handle(conductor: &Conductor, method: &str, url: &str, body: &str) -> ApiResponse {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };

    match route(method, path) {
        Route::Ping => misc::handle_ping(),
        Route::ListSessions => sessions::handle_list(conductor),
        Route::CreateSession => sessions::handle_create(conductor, body),
        Route::SendMessage(id) => dispatch::handle_send(conductor, id, body),
        Route::GetOutput(id) => sessions::handle_output(conductor, id, query),
        Route::DeleteSession(id) => sessions::handle_delete(conductor, id),
        Route::StartSession(id) => sessions::handle_start(conductor, id),
        Route::StopSession(id) => sessions::handle_stop(conductor, id),
        Route::Broadcast => dispatch::handle_broadcast(conductor, body),
        Route::AllOutputs => misc::handle_all_outputs(conductor, query),
        Route::ListTasks => dispatch::handle_tasks(conductor, query),
        Route::NotFound => ApiResponse::error(404, "not_found"),
    }
}

pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiResponse> {
    raw.parse::<SessionId>()
        .map_err(|_| ApiResponse::error_with_message(400, "bad_session_id", raw))
}

/// First value of `key` in a query string
pub(crate) fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Parse `lines=N` from the query, if present
pub(crate) fn parse_lines(query: Option<&str>) -> Result<Option<usize>, ApiResponse> {
    match query_param(query, "lines") {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ApiResponse::error_with_message(400, "bad_lines", raw)),
    }
}

/// Parse a JSON body, treating an empty body as `{}`
pub(crate) fn parse_body<T>(body: &str) -> Result<T, ApiResponse>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body)
        .map_err(|e| ApiResponse::error_with_message(400, "invalid_json", e.to_string()))
}
