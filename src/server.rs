//! HTTP front end: routes uploads to the store and collage requests to the composer.
//!
//! The accept loop runs on a plain thread over `tiny_http`; every request is
//! handed to the tokio runtime and answered independently. All errors are
//! turned into a JSON `{ "error": ... }` body at this boundary.

use crate::collage::CollageComposer;
use crate::storage::DrawingStore;
use crate::{Error, Result, ServerConfig};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response};

#[derive(Debug, Deserialize)]
struct UploadRequest {
    image: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse<'a> {
    success: bool,
    filename: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// What a handler decided to send back.
#[derive(Debug)]
enum Reply {
    Json(u16, Vec<u8>),
    Png(Vec<u8>),
    NoContent,
}

impl Reply {
    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Reply::Json(status, bytes),
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Reply::Json(500, br#"{"error":"Internal server error"}"#.to_vec())
            }
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Reply::json(status, &ErrorBody { error: message })
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let (status, content_type, body) = match self {
            Reply::Json(status, body) => (status, Some("application/json"), body),
            Reply::Png(body) => (200, Some("image/png"), body),
            Reply::NoContent => (204, None, Vec::new()),
        };

        let mut response = Response::from_data(body).with_status_code(status);
        if let Some(ct) = content_type {
            response = with_header(response, "Content-Type", ct);
        }
        response = with_header(response, "Access-Control-Allow-Origin", "*");
        response
    }
}

fn with_header(
    response: Response<Cursor<Vec<u8>>>,
    name: &str,
    value: &str,
) -> Response<Cursor<Vec<u8>>> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(h) => response.with_header(h),
        Err(()) => {
            warn!("Dropping malformed header {}", name);
            response
        }
    }
}

fn preflight_response() -> Response<Cursor<Vec<u8>>> {
    let mut response = Reply::NoContent.into_response();
    response = with_header(response, "Access-Control-Allow-Methods", "GET, POST, OPTIONS");
    response = with_header(response, "Access-Control-Allow-Headers", "Content-Type");
    response
}

struct AppState {
    store: DrawingStore,
    composer: CollageComposer,
    max_body_bytes: usize,
}

/// A bound, not-yet-running drawing server.
pub struct Server {
    http: tiny_http::Server,
    state: Arc<AppState>,
}

impl Server {
    /// Create the drawings directory and bind the listening socket.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let store = DrawingStore::open(&config.drawings_dir)?;
        let composer = CollageComposer::new(store.clone(), config.collage.clone());

        let addr = config.listen_addr();
        let http = tiny_http::Server::http(addr.as_str())
            .map_err(|e| Error::InitializationError(format!("Failed to bind {}: {}", addr, e)))?;

        info!(
            "Storing drawings in {} (max upload {} bytes)",
            store.dir().display(),
            config.max_body_bytes
        );

        Ok(Self {
            http,
            state: Arc::new(AppState {
                store,
                composer,
                max_body_bytes: config.max_body_bytes,
            }),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.server_addr().to_ip()
    }

    /// Accept requests until [`Server::unblock`] is called.
    ///
    /// Blocks the calling thread; each request is handled as a task on `runtime`.
    pub fn run(&self, runtime: tokio::runtime::Handle) {
        for request in self.http.incoming_requests() {
            let state = Arc::clone(&self.state);
            runtime.spawn(handle_request(state, request));
        }
        info!("Server stopped accepting requests");
    }

    /// Make a pending or future [`Server::run`] return.
    pub fn unblock(&self) {
        self.http.unblock();
    }
}

async fn handle_request(state: Arc<AppState>, request: Request) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or_default().to_string();
    debug!("{} {}", method, path);

    match (method, path.as_str()) {
        (Method::Options, _) => respond(request, preflight_response()).await,
        (Method::Post, "/upload") => {
            // Body reads and file writes block; keep them off the async workers.
            let task = tokio::task::spawn_blocking(move || {
                let mut request = request;
                let reply = upload(&state, &mut request);
                send(request, reply.into_response());
            });
            if let Err(e) = task.await {
                error!("Upload handler panicked: {}", e);
            }
        }
        (Method::Get, "/collage") => {
            let reply = collage(&state).await;
            respond(request, reply.into_response()).await;
        }
        _ => respond(request, Reply::error(404, "Not found").into_response()).await,
    }
}

/// Write `response` from the blocking pool; a slow reader must not pin a worker.
async fn respond(request: Request, response: Response<Cursor<Vec<u8>>>) {
    if let Err(e) = tokio::task::spawn_blocking(move || send(request, response)).await {
        error!("Response writer panicked: {}", e);
    }
}

fn send(request: Request, response: Response<Cursor<Vec<u8>>>) {
    if let Err(e) = request.respond(response) {
        warn!("Failed to send response: {}", e);
    }
}

fn upload(state: &AppState, request: &mut Request) -> Reply {
    let result = read_body(request, state.max_body_bytes).and_then(|body| {
        let payload = serde_json::from_slice::<UploadRequest>(&body)
            .ok()
            .and_then(|req| req.image);
        state.store.save(payload.as_deref())
    });

    match result {
        Ok(filename) => {
            info!("Saved drawing {}", filename);
            Reply::json(
                200,
                &UploadResponse {
                    success: true,
                    filename: &filename,
                },
            )
        }
        Err(e @ Error::InvalidInput(_)) => {
            debug!("Rejected upload: {}", e);
            Reply::error(e.status_code(), "Invalid image data")
        }
        Err(e @ Error::PayloadTooLarge(_)) => {
            warn!("Rejected upload: {}", e);
            Reply::error(e.status_code(), "Payload too large")
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            Reply::error(500, "Failed to save image")
        }
    }
}

fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Err(Error::PayloadTooLarge(limit));
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| Error::InvalidInput(format!("Failed to read request body: {}", e)))?;

    if body.len() > limit {
        return Err(Error::PayloadTooLarge(limit));
    }
    Ok(body)
}

async fn collage(state: &AppState) -> Reply {
    match state.composer.compose().await {
        Ok(collage) => Reply::Png(collage.png_data),
        Err(e @ Error::NotFound(_)) => {
            debug!("Collage requested with no drawings");
            Reply::error(e.status_code(), "No drawings found")
        }
        Err(e @ Error::EncodingFailure(_)) => {
            error!("Collage encoding failed: {}", e);
            Reply::error(500, "Failed to create collage")
        }
        Err(e) => {
            error!("Collage generation failed: {}", e);
            Reply::error(500, "Error generating collage")
        }
    }
}
