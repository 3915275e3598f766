//! Local control API over HTTP
//!
//! Listens on 127.0.0.1 only and accepts:
//! - GET /sessions, POST /sessions
//! - POST /sessions/{id}/send, GET /sessions/{id}/output, DELETE /sessions/{id}
//! - POST /sessions/{id}/start, POST /sessions/{id}/stop
//! - POST /broadcast, GET /outputs, GET /tasks, GET /ping
//!
//! Each request is handled on its own short-lived thread and answered with
//! exactly one JSON response.

pub mod handlers;
pub mod types;

pub use handlers::{handle, route, Route};
pub use types::ApiResponse;

use anyhow::{anyhow, Result};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Response, Server};
use tracing::{debug, error, info, warn};

use crate::Conductor;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024; // 2 MiB

/// A running control API server
pub struct ControlServer {
    server: Arc<Server>,
    port: u16,
    shutting_down: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind 127.0.0.1:`port` (0 picks a free port) and serve requests on a
    /// background thread until [`ControlServer::shutdown`].
    pub fn start(conductor: Conductor, port: u16) -> Result<Self> {
        let bind_addr = format!("127.0.0.1:{}", port);
        let server = Server::http(&bind_addr)
            .map_err(|e| anyhow!("Failed to start control API on {}: {}", bind_addr, e))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        let server = Arc::new(server);
        let shutting_down = Arc::new(AtomicBool::new(false));

        info!(
            "[conductor:http] Control API listening on http://127.0.0.1:{}",
            port
        );

        let loop_server = server.clone();
        let loop_shutdown = shutting_down.clone();
        let thread = thread::Builder::new()
            .name("conductor-http".to_string())
            .spawn(move || serve(loop_server, conductor, loop_shutdown))?;

        Ok(Self {
            server,
            port,
            shutting_down,
            thread: Some(thread),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop accepting requests and wait for the accept loop to exit
    pub fn shutdown(&mut self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        info!("[conductor:http] Control API stopped");
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}

fn serve(server: Arc<Server>, conductor: Conductor, shutting_down: Arc<AtomicBool>) {
    loop {
        let request = match server.recv() {
            Ok(request) => request,
            Err(e) => {
                if shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                warn!("[conductor:http] Failed to accept request: {}", e);
                continue;
            }
        };

        let conductor = conductor.clone();
        let spawned = thread::Builder::new()
            .name("conductor-http-request".to_string())
            .spawn(move || handle_request(&conductor, request));
        if let Err(e) = spawned {
            error!("[conductor:http] Failed to spawn request thread: {}", e);
        }
    }
}

fn handle_request(conductor: &Conductor, mut request: tiny_http::Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();

    let body = match read_request_body(&mut request) {
        Ok(body) => body,
        Err(response) => {
            respond_json(request, response);
            return;
        }
    };

    let response = handle(conductor, &method, &url, &body);
    debug!("[conductor:http] {} {} -> {}", method, url, response.status);
    respond_json(request, response);
}

fn json_content_type() -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok()
}

fn connection_close() -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(&b"Connection"[..], &b"close"[..]).ok()
}

fn read_request_body(request: &mut tiny_http::Request) -> Result<String, ApiResponse> {
    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_BODY_BYTES + 1) as u64);
    if let Err(e) = reader.read_to_string(&mut body) {
        error!("[conductor:http] Failed to read body: {}", e);
        return Err(ApiResponse::error(400, "bad_request"));
    }

    if body.len() > MAX_BODY_BYTES {
        return Err(ApiResponse::error(413, "payload_too_large"));
    }

    Ok(body)
}

fn respond_json(request: tiny_http::Request, response: ApiResponse) {
    let body = serde_json::to_string(&response.body)
        .unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let mut http_response = Response::from_string(body).with_status_code(response.status);
    for header in [json_content_type(), connection_close()].into_iter().flatten() {
        http_response = http_response.with_header(header);
    }
    if let Err(e) = request.respond(http_response) {
        debug!("[conductor:http] Failed to send response: {}", e);
    }
}
