//! Health and aggregate handlers.

use super::super::types::ApiResponse;
use super::parse_lines;
use crate::Conductor;

pub fn handle_ping() -> ApiResponse {
    ApiResponse::ok(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn handle_all_outputs(conductor: &Conductor, query: Option<&str>) -> ApiResponse {
    let lines = match parse_lines(query) {
        Ok(lines) => lines,
        Err(response) => return response,
    };

    let outputs = conductor.all_outputs(lines);
    ApiResponse::ok(serde_json::json!({
        "count": outputs.len(),
        "outputs": outputs,
    }))
}
