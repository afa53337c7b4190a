//! Request logging middleware

use super::super::state::ServerState;
use crate::server::metrics::{categorize_endpoint, record_http_request};
use axum::extract::State;
use axum::{
    body::{to_bytes, Body},
    http::{header, header::HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn log_headers(headers: &HeaderMap) {
    for (name, value) in headers {
        info!("    {}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
}

enum ContentLength {
    Known(usize),
    Unknown(&'static str),
}

fn parse_content_length(headers: &HeaderMap) -> ContentLength {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return ContentLength::Unknown("content-length not set");
    };
    match value.to_str().ok().and_then(|v| v.parse::<usize>().ok()) {
        Some(size) => ContentLength::Known(size),
        None => ContentLength::Unknown("unreadable content-length"),
    }
}

/// Log the body when it is small enough, always handing the request on.
async fn log_request_body(request: Request<Body>) -> Result<Request<Body>, Response> {
    let size = match parse_content_length(request.headers()) {
        ContentLength::Unknown(reason) => {
            info!("    body: {}", reason);
            return Ok(request);
        }
        ContentLength::Known(size) if size >= MAX_LOGGABLE_BODY_LENGTH => {
            info!("    body: too big to log ({} bytes)", size);
            return Ok(request);
        }
        ContentLength::Known(size) => size,
    };

    let (parts, body) = request.into_parts();
    match to_bytes(body, size).await {
        Ok(bytes) => {
            if !bytes.is_empty() {
                info!("    body: {}", String::from_utf8_lossy(&bytes));
            }
            Ok(Request::from_parts(parts, Body::from(bytes)))
        }
        Err(e) => {
            error!("Failed to read request body: {}", e);
            Err((StatusCode::BAD_REQUEST, "Unreadable request body").into_response())
        }
    }
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, uri);
    }
    if level >= RequestsLoggingLevel::Headers {
        log_headers(request.headers());
    }

    let request = if level >= RequestsLoggingLevel::Body {
        match log_request_body(request).await {
            Ok(request) => request,
            Err(response) => return response,
        }
    } else {
        request
    };

    let response = next.run(request).await;
    let elapsed = start.elapsed();
    let status = response.status().as_u16();

    record_http_request(&method, &categorize_endpoint(&path), status, elapsed);

    if level > RequestsLoggingLevel::None {
        info!("<<< {} {} in {:?}", status, path, elapsed);
    }
    if level >= RequestsLoggingLevel::Headers {
        log_headers(response.headers());
    }

    response
}
