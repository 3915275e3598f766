//! Session lifecycle handlers.

use tracing::info;

use super::super::types::{
    ApiResponse, CreateSessionRequest, CreateSessionResponse, SessionListResponse, SessionSummary,
};
use super::{parse_body, parse_lines, parse_session_id};
use crate::{Conductor, NewSession, SessionRole};

pub fn handle_list(conductor: &Conductor) -> ApiResponse {
    let sessions: Vec<SessionSummary> = conductor
        .list_sessions()
        .iter()
        .map(SessionSummary::from)
        .collect();
    let count = sessions.len();
    ApiResponse::from_serializable(200, &SessionListResponse { sessions, count })
}

pub fn handle_create(conductor: &Conductor, body: &str) -> ApiResponse {
    let req: CreateSessionRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let new = match NewSession::new(req.name.as_deref(), req.directory.as_deref()) {
        Ok(new) => new
            .with_port(req.mcp_port)
            .with_role(SessionRole::from_lenient(req.role.as_deref()))
            .with_initial_prompt(req.initial_prompt),
        Err(e) => return e.into(),
    };

    match conductor.create_session(new) {
        Ok(session) => {
            info!(
                "[conductor:http] Created session {} '{}'",
                session.id, session.name
            );
            ApiResponse::from_serializable(201, &CreateSessionResponse::from(&session))
        }
        Err(e) => e.into(),
    }
}

pub fn handle_output(conductor: &Conductor, raw_id: &str, query: Option<&str>) -> ApiResponse {
    let id = match parse_session_id(raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let lines = match parse_lines(query) {
        Ok(lines) => lines,
        Err(response) => return response,
    };

    match conductor.output(id, lines) {
        Ok(output) => ApiResponse::from_serializable(200, &output),
        Err(e) => e.into(),
    }
}

pub fn handle_delete(conductor: &Conductor, raw_id: &str) -> ApiResponse {
    let id = match parse_session_id(raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match conductor.remove_session(id) {
        Ok(_) => ApiResponse::ok(serde_json::json!({ "status": "deleted", "id": id })),
        Err(e) => e.into(),
    }
}

pub fn handle_start(conductor: &Conductor, raw_id: &str) -> ApiResponse {
    let id = match parse_session_id(raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match conductor.start_session(id) {
        Ok(session) => {
            let mut body = serde_json::json!({
                "status": "started",
                "id": id,
                "session_status": session.status,
            });
            // Present only when the spawn failed
            if let Some(error) = session.last_error {
                body["error"] = error.into();
            }
            ApiResponse::ok(body)
        }
        Err(e) => e.into(),
    }
}

pub fn handle_stop(conductor: &Conductor, raw_id: &str) -> ApiResponse {
    let id = match parse_session_id(raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match conductor.stop_session(id) {
        Ok(session) => ApiResponse::ok(serde_json::json!({
            "status": "stopped",
            "id": id,
            "session_status": session.status,
        })),
        Err(e) => e.into(),
    }
}
