/// MCP Server Transports
///
/// This module wires `McpServer` to its transports:
/// - HTTP server setup with Actix Web (health, metrics, JSON-RPC POST)
/// - the SSE transport: a persistent event stream per client plus a POST
///   endpoint the client sends its messages to
/// - STDIO, newline-delimited JSON-RPC for local clients and MCP Inspector

use actix_web::{
    HttpResponse, HttpServer, App,
    http::{StatusCode, header},
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::core::config::ServerConfig;
use crate::core::protocol::{INTERNAL_ERROR, McpResponse, McpServer, Metrics};

/// Interval between SSE keep-alive comments.
pub const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Buffered events per SSE session before senders wait.
const SSE_CHANNEL_CAPACITY: usize = 64;

/// Open SSE sessions, keyed by the session id handed to the client in the
/// `endpoint` event.
pub struct SseSessions {
    senders: Mutex<HashMap<String, mpsc::Sender<Bytes>>>,
    keep_alive: Duration,
}

impl Default for SseSessions {
    fn default() -> Self {
        Self::with_keep_alive(SSE_KEEP_ALIVE)
    }
}

impl SseSessions {
    pub fn with_keep_alive(keep_alive: Duration) -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            keep_alive,
        }
    }

    /// Register a new session. The returned receiver feeds the client's
    /// event stream.
    pub fn open(&self) -> (String, mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>) {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);
        self.lock().insert(id.clone(), tx.clone());
        (id, tx, rx)
    }

    pub fn get(&self, id: &str) -> Option<mpsc::Sender<Bytes>> {
        self.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &str) {
        if self.lock().remove(id).is_some() {
            tracing::info!(session_id = id, "SSE session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<Bytes>>> {
        // The map stays consistent even if a holder panicked
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Format one server-sent event.
fn sse_event(event: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

/// Run a message through the dispatcher on the blocking pool.
///
/// Tool handlers do file and process I/O, which must stay off the actix
/// worker threads.
async fn dispatch(server: web::Data<McpServer>, body: String) -> Option<McpResponse> {
    match web::block(move || server.handle_message(&body)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Request handler failed");
            Some(McpResponse::error(None, INTERNAL_ERROR, "Internal error"))
        }
    }
}

/// Health check endpoint handler.
///
/// Used by load balancers and monitoring systems to verify server availability.
async fn health(server: web::Data<McpServer>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": server.name
    }))
}

#[derive(Serialize)]
struct MetricsReport {
    #[serde(flatten)]
    counters: Metrics,
    sse_sessions: usize,
    status: &'static str,
}

/// Metrics endpoint handler for monitoring.
async fn metrics_handler(
    server: web::Data<McpServer>,
    sessions: web::Data<SseSessions>,
) -> HttpResponse {
    HttpResponse::Ok().json(MetricsReport {
        counters: server.metrics(),
        sse_sessions: sessions.len(),
        status: "ok",
    })
}

/// Single request/response JSON-RPC over HTTP POST.
///
/// Notifications are acknowledged with 202 and an empty body.
async fn mcp_handler(server: web::Data<McpServer>, body: String) -> HttpResponse {
    match dispatch(server, body).await {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Accepted().finish(),
    }
}

/// Opens an SSE session.
///
/// The first event tells the client where to POST its messages; responses
/// to those messages arrive on this stream as `message` events.
async fn sse_connect(sessions: web::Data<SseSessions>) -> HttpResponse {
    let (session_id, tx, rx) = sessions.open();
    tracing::info!(session_id = %session_id, "SSE session opened");

    let endpoint = format!("/messages?session_id={session_id}");
    // The channel is fresh, so this cannot be full
    let _ = tx.try_send(sse_event("endpoint", &endpoint));

    // Keep-alive doubles as disconnect detection: once the client is gone
    // the receiver is dropped and the send fails.
    let keep_alive_sessions = sessions.clone();
    actix_rt::spawn(async move {
        let mut interval = actix_rt::time::interval(keep_alive_sessions.keep_alive);
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.send(Bytes::from_static(b": keep-alive\n\n")).await.is_err() {
                break;
            }
        }
        keep_alive_sessions.remove(&session_id);
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, actix_web::Error>(chunk), rx))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        // Disable caching to ensure clients always get fresh data
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // Keep the compression middleware from buffering the stream
        .insert_header((header::CONTENT_ENCODING, "identity"))
        // Disable nginx buffering for real-time streaming
        .insert_header(("x-accel-buffering", "no"))
        .streaming(stream)
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// Receives a client message for an SSE session.
async fn sse_message(
    server: web::Data<McpServer>,
    sessions: web::Data<SseSessions>,
    query: web::Query<SessionQuery>,
    body: String,
) -> HttpResponse {
    let Some(tx) = sessions.get(&query.session_id) else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Unknown session: {}", query.session_id)
        }));
    };

    if let Some(response) = dispatch(server, body).await {
        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Error serializing response");
                return HttpResponse::InternalServerError().finish();
            }
        };
        if tx.send(sse_event("message", &payload)).await.is_err() {
            sessions.remove(&query.session_id);
            return HttpResponse::build(StatusCode::GONE).finish();
        }
    }

    HttpResponse::Accepted().finish()
}

/// Register all HTTP routes. Application data (`McpServer`, `SseSessions`)
/// is expected to be attached by the caller.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/sse", web::get().to(sse_connect))
        .route("/messages", web::post().to(sse_message))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// The server is configured with:
/// - Worker threads: from configuration (CPU count, max 16, by default)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(server: Arc<McpServer>, config: &ServerConfig) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let server = web::Data::from(server);
    let sessions = web::Data::new(SseSessions::default());

    tracing::info!(
        name = %config.name,
        version = %config.version,
        bind_addr = %bind_addr,
        workers = config.workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(server.clone())
            .app_data(sessions.clone())
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            // Add security headers to all responses
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes)
    })
    .workers(config.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
///
/// Reads JSON-RPC requests line-by-line from stdin and writes responses to
/// stdout. All logging goes to stderr so the protocol stream stays clean.
pub async fn run_server_stdio(server: Arc<McpServer>) -> std::io::Result<()> {
    tracing::info!(name = %server.name, version = %server.version, "MCP server starting (STDIO mode)");

    let stdin = tokio::io::BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = tokio::io::BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(server, stdin, stdout).await
}

/// Serve newline-delimited JSON-RPC until `reader` hits EOF.
///
/// Requests are processed one at a time; each response is written as a
/// single line and flushed immediately.
pub async fn serve_lines<R, W>(server: Arc<McpServer>, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let handler = server.clone();
        let response = match tokio::task::spawn_blocking(move || handler.handle_message(&line)).await {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "Request handler failed");
                McpResponse::error(None, INTERNAL_ERROR, "Internal error")
            }
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Error serializing response");
                continue;
            }
        };

        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    tracing::info!("STDIO input closed");
    Ok(())
}
