//! Message dispatch handlers.

use super::super::types::{ApiResponse, MessageRequest};
use super::{parse_body, parse_session_id, query_param};
use crate::{Conductor, ConductorError};

pub fn handle_send(conductor: &Conductor, raw_id: &str, body: &str) -> ApiResponse {
    let id = match parse_session_id(raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let req: MessageRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match conductor.send(id, req.message.as_deref().unwrap_or_default()) {
        Ok(receipt) => ApiResponse::ok(serde_json::json!({
            "status": "sent",
            "id": id,
            "task_id": receipt.task_id,
            "delivered": receipt.delivered,
        })),
        // Sending addresses an existing session; an unknown id is a bad request here
        Err(ConductorError::NotFound(_)) => {
            ApiResponse::error_with_message(400, "invalid_session_id", raw_id)
        }
        Err(e) => e.into(),
    }
}

pub fn handle_broadcast(conductor: &Conductor, body: &str) -> ApiResponse {
    let req: MessageRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match conductor.broadcast(req.message.as_deref().unwrap_or_default()) {
        Ok(receipts) => ApiResponse::ok(serde_json::json!({
            "status": "sent",
            "count": receipts.len(),
            "results": receipts,
        })),
        Err(e) => e.into(),
    }
}

pub fn handle_tasks(conductor: &Conductor, query: Option<&str>) -> ApiResponse {
    let target = match query_param(query, "session") {
        Some(raw) => match parse_session_id(raw) {
            Ok(id) => Some(id),
            Err(response) => return response,
        },
        None => None,
    };

    let tasks = conductor.tasks(target);
    ApiResponse::ok(serde_json::json!({
        "count": tasks.len(),
        "tasks": tasks,
    }))
}
