//! Minimal HTTP front for the idea service
//!
//! Routes:
//! - `GET  /health` - liveness
//! - `GET  /ideas`  - accepted ideas in insertion order
//! - `POST /ideas`  - submit an idea
//!
//! One request per connection, JSON bodies only.

use crate::enrich::Enricher;
use crate::service::IdeaService;
use crate::types::IdeaSubmission;
use anyhow::Result;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

/// Largest request body accepted
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Longest request line or header line accepted, terminator included
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

/// Most header lines read before giving up
pub const MAX_HEADERS: usize = 64;

/// Why a request could not be read off the wire
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("Invalid Content-Length header: {0:?}")]
    InvalidContentLength(String),

    #[error("Request body of {length} bytes exceeds {limit} byte limit")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("Header line longer than {0} bytes")]
    HeaderLineTooLong(usize),

    #[error("More than {0} request headers")]
    TooManyHeaders(usize),

    #[error("Failed to read request: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::BodyTooLarge { .. } => 413,
            RequestError::HeaderLineTooLong(_) | RequestError::TooManyHeaders(_) => 431,
            _ => 400,
        }
    }
}

/// Status and optional JSON body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Option<Value>,
}

impl HttpReply {
    fn json(status: u16, body: Value) -> Self {
        Self { status, body: Some(body) }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({"status": "error", "message": message.into()}))
    }
}

/// Parsed request line, headers of interest and body
#[derive(Debug, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub origin: Option<String>,
    pub body: Vec<u8>,
}

/// Dispatch one request to the service
pub async fn route<N: Enricher>(
    service: &IdeaService<N>,
    method: &str,
    path: &str,
    body: &[u8],
) -> HttpReply {
    let path = path.split('?').next().unwrap_or("");

    match (method, path) {
        ("OPTIONS", _) => HttpReply { status: 204, body: None },
        ("GET", "/health") => HttpReply::json(200, json!({"status": "ok"})),
        ("GET", "/ideas") => match service.list_ideas() {
            Ok(ideas) => HttpReply::json(200, json!({ "ideas": ideas })),
            Err(e) => {
                tracing::error!(error = %e, "Listing ideas failed");
                HttpReply::error(e.status_code(), e.to_string())
            }
        },
        ("POST", "/ideas") => {
            let submission: IdeaSubmission = match serde_json::from_slice(body) {
                Ok(s) => s,
                Err(e) => return HttpReply::error(400, format!("Invalid idea payload: {}", e)),
            };

            match service.submit_idea(submission).await {
                Ok(response) => match serde_json::to_value(&response) {
                    Ok(value) => HttpReply::json(200, value),
                    Err(e) => HttpReply::error(500, e.to_string()),
                },
                Err(e) => {
                    tracing::error!(error = %e, "Submission failed");
                    HttpReply::error(e.status_code(), e.to_string())
                }
            }
        }
        (_, "/health") | (_, "/ideas") => HttpReply::error(405, "Method not allowed"),
        _ => HttpReply::error(404, "Not found"),
    }
}

/// Read one line, refusing lines longer than [`MAX_HEADER_LINE_BYTES`]
async fn read_capped_line<R>(reader: &mut R, line: &mut String) -> Result<usize, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let read = (&mut *reader)
        .take(MAX_HEADER_LINE_BYTES as u64)
        .read_line(line)
        .await?;
    if read == MAX_HEADER_LINE_BYTES && !line.ends_with('\n') {
        return Err(RequestError::HeaderLineTooLong(MAX_HEADER_LINE_BYTES));
    }
    Ok(read)
}

/// Read a request: request line, headers up to the blank line, then the body
pub async fn read_request<R: AsyncRead + Unpin>(stream: R) -> Result<HttpRequest, RequestError> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    read_capped_line(&mut reader, &mut request_line).await?;

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Err(RequestError::MalformedRequestLine(request_line.trim().to_string()));
    };

    let mut request = HttpRequest {
        method: method.to_uppercase(),
        path: path.to_string(),
        ..Default::default()
    };

    let mut content_length: usize = 0;
    let mut headers = 0;
    loop {
        let mut header = String::new();
        if read_capped_line(&mut reader, &mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
        headers += 1;
        if headers > MAX_HEADERS {
            return Err(RequestError::TooManyHeaders(MAX_HEADERS));
        }

        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        match name.trim().to_lowercase().as_str() {
            "content-length" => {
                let value = value.trim();
                content_length = value
                    .parse()
                    .map_err(|_| RequestError::InvalidContentLength(value.to_string()))?;
            }
            "origin" => request.origin = Some(value.trim().to_string()),
            _ => {}
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(RequestError::BodyTooLarge {
            length: content_length,
            limit: MAX_BODY_BYTES,
        });
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }
    request.body = body;

    Ok(request)
}

/// Origin to echo back, if the request's origin is allowed
pub fn allowed_origin<'a>(allowed: &'a [String], origin: Option<&'a str>) -> Option<&'a str> {
    let origin = origin?;
    allowed
        .iter()
        .find(|a| a.as_str() == "*" || a.as_str() == origin)
        .map(|_| origin)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Serialize a reply with CORS headers for `origin`
pub fn render_response(reply: &HttpReply, origin: Option<&str>) -> String {
    let body = reply
        .body
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_default();

    let mut response = format!("HTTP/1.1 {} {}\r\n", reply.status, reason_phrase(reply.status));
    if reply.body.is_some() {
        response.push_str("Content-Type: application/json\r\n");
    }
    response.push_str(&format!("Content-Length: {}\r\n", body.len()));
    if let Some(origin) = origin {
        response.push_str(&format!("Access-Control-Allow-Origin: {}\r\n", origin));
        response.push_str("Access-Control-Allow-Credentials: true\r\n");
        response.push_str("Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n");
        response.push_str("Access-Control-Allow-Headers: Content-Type, Authorization\r\n");
        response.push_str("Vary: Origin\r\n");
    }
    response.push_str("Connection: close\r\n\r\n");
    response.push_str(&body);
    response
}

/// Serve a single request on `stream`
pub async fn handle_connection<S, N>(
    stream: S,
    service: &IdeaService<N>,
    cors_origins: &[String],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    N: Enricher,
{
    let (read_half, mut write_half) = tokio::io::split(stream);

    let (reply, origin) = match read_request(read_half).await {
        Ok(request) => {
            let reply = route(service, &request.method, &request.path, &request.body).await;
            tracing::debug!(method = %request.method, path = %request.path, status = reply.status, "Request handled");
            let origin = allowed_origin(cors_origins, request.origin.as_deref()).map(|o| o.to_string());
            (reply, origin)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable request");
            (HttpReply::error(e.status_code(), e.to_string()), None)
        }
    };

    write_half
        .write_all(render_response(&reply, origin.as_deref()).as_bytes())
        .await?;
    write_half.flush().await?;
    write_half.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::embeddings::{Embedder, HashingEmbedder};
    use crate::enrich::TemplateEnricher;
    use crate::gate::SubmissionGate;
    use std::sync::Arc;
    use std::time::Duration;

    struct DownEmbedder;

    impl Embedder for DownEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Err(anyhow::anyhow!("connection refused"))
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn service_with(embedder: Arc<dyn Embedder>) -> IdeaService<TemplateEnricher> {
        let config = GateConfig {
            embed_attempts: 2,
            retry_backoff: Duration::ZERO,
            ..GateConfig::default()
        };
        IdeaService::new(SubmissionGate::new(embedder, &config), TemplateEnricher)
    }

    const FOOD_WASTE: &str = r#"{
        "ideaName": "Food Bridge",
        "problem": "Too many restaurants waste unsold food daily",
        "solution": "An app connecting restaurants with surplus food to nearby shelters",
        "advantages": "Real-time matching reduces waste and feeds people faster",
        "fields": ["foodtech"]
    }"#;

    #[test]
    fn test_health() {
        let service = service_with(Arc::new(HashingEmbedder::default()));
        let reply = tokio_test::block_on(route(&service, "GET", "/health", b""));
        assert_eq!(reply, HttpReply::json(200, json!({"status": "ok"})));
    }

    #[test]
    fn test_post_then_list() {
        let service = service_with(Arc::new(HashingEmbedder::default()));

        let reply = tokio_test::block_on(route(&service, "POST", "/ideas", FOOD_WASTE.as_bytes()));
        assert_eq!(reply.status, 200);
        let body = reply.body.unwrap();
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["ideaName"], "Food Bridge");
        assert!(body["summary"].is_string());
        assert!(body["businessModel"].is_object());

        let again = tokio_test::block_on(route(&service, "POST", "/ideas", FOOD_WASTE.as_bytes()));
        let body = again.body.unwrap();
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["nearest_match"], "Food Bridge");
        assert!(body["similarity_score"].as_f64().unwrap() >= 0.82);
        assert!(body["improvement_tips"].is_object());

        let list = tokio_test::block_on(route(&service, "GET", "/ideas?limit=5", b""));
        let ideas = list.body.unwrap()["ideas"].as_array().unwrap().clone();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0]["ideaName"], "Food Bridge");
        assert!(ideas[0]["bmc"].is_object());
        assert!(ideas[0]["summary"].is_string());
    }

    #[test]
    fn test_invalid_payloads() {
        let service = service_with(Arc::new(HashingEmbedder::default()));

        let malformed = tokio_test::block_on(route(&service, "POST", "/ideas", b"{not json"));
        assert_eq!(malformed.status, 400);

        let weak = tokio_test::block_on(route(
            &service,
            "POST",
            "/ideas",
            br#"{"ideaName": "x", "problem": "meh"}"#,
        ));
        assert_eq!(weak.status, 200);
        let body = weak.body.unwrap();
        assert_eq!(body["status"], "invalid");
        assert_eq!(body["errors"]["problem"], "Please provide a clear Problem.");
    }

    #[test]
    fn test_embedder_down_is_503() {
        let service = service_with(Arc::new(DownEmbedder));
        let reply = tokio_test::block_on(route(&service, "POST", "/ideas", FOOD_WASTE.as_bytes()));
        assert_eq!(reply.status, 503);
        assert_eq!(reply.body.unwrap()["status"], "error");
        assert!(service.list_ideas().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_routes() {
        let service = service_with(Arc::new(HashingEmbedder::default()));
        assert_eq!(tokio_test::block_on(route(&service, "GET", "/nope", b"")).status, 404);
        assert_eq!(tokio_test::block_on(route(&service, "DELETE", "/ideas", b"")).status, 405);
        assert_eq!(tokio_test::block_on(route(&service, "OPTIONS", "/ideas", b"")).status, 204);
    }

    #[test]
    fn test_allowed_origin() {
        let allowed = vec!["http://localhost:5173".to_string()];
        assert_eq!(
            allowed_origin(&allowed, Some("http://localhost:5173")),
            Some("http://localhost:5173")
        );
        assert_eq!(allowed_origin(&allowed, Some("http://evil.test")), None);
        assert_eq!(allowed_origin(&allowed, None), None);

        let any = vec!["*".to_string()];
        assert_eq!(allowed_origin(&any, Some("http://a.test")), Some("http://a.test"));
    }

    #[test]
    fn test_connection_round_trip() {
        let service = service_with(Arc::new(HashingEmbedder::default()));
        let origins = vec!["http://localhost:5173".to_string()];
        let request = format!(
            "POST /ideas HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:5173\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            FOOD_WASTE.len(),
            FOOD_WASTE
        );

        let response = tokio_test::block_on(async {
            let (mut client, server) = tokio::io::duplex(MAX_BODY_BYTES);
            client.write_all(request.as_bytes()).await.unwrap();
            handle_connection(server, &service, &origins).await.unwrap();

            let mut response = String::new();
            client.read_to_string(&mut response).await.unwrap();
            response
        });

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Access-Control-Allow-Origin: http://localhost:5173\r\n"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let value: Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["status"], "accepted");
    }

    #[test]
    fn test_oversized_body_rejected() {
        let service = service_with(Arc::new(HashingEmbedder::default()));
        let request = format!(
            "POST /ideas HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_BYTES + 1
        );

        let response = tokio_test::block_on(async {
            let (mut client, server) = tokio::io::duplex(4096);
            client.write_all(request.as_bytes()).await.unwrap();
            handle_connection(server, &service, &[]).await.unwrap();

            let mut response = String::new();
            client.read_to_string(&mut response).await.unwrap();
            response
        });

        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    fn exchange(service: &IdeaService<TemplateEnricher>, request: &str) -> String {
        tokio_test::block_on(async {
            let (mut client, server) = tokio::io::duplex(MAX_BODY_BYTES);
            client.write_all(request.as_bytes()).await.unwrap();
            handle_connection(server, service, &[]).await.unwrap();

            let mut response = String::new();
            client.read_to_string(&mut response).await.unwrap();
            response
        })
    }

    #[test]
    fn test_read_request_errors_are_typed() {
        let oversized = format!("POST /ideas HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_BYTES + 1);
        let err = tokio_test::block_on(read_request(oversized.as_bytes())).unwrap_err();
        assert!(matches!(err, RequestError::BodyTooLarge { length, .. } if length == MAX_BODY_BYTES + 1));
        assert_eq!(err.status_code(), 413);

        let garbled = "POST /ideas HTTP/1.1\r\nContent-Length: twelve\r\n\r\n{}";
        let err = tokio_test::block_on(read_request(garbled.as_bytes())).unwrap_err();
        assert!(matches!(err, RequestError::InvalidContentLength(ref v) if v == "twelve"));
        assert_eq!(err.status_code(), 400);

        let err = tokio_test::block_on(read_request(&b"\r\n"[..])).unwrap_err();
        assert!(matches!(err, RequestError::MalformedRequestLine(_)));
    }

    #[test]
    fn test_bad_content_length_is_reported() {
        let service = service_with(Arc::new(HashingEmbedder::default()));
        let request = format!(
            "POST /ideas HTTP/1.1\r\nContent-Length: 12abc\r\n\r\n{}",
            FOOD_WASTE
        );

        let response = exchange(&service, &request);
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Invalid Content-Length header"));
        assert!(service.list_ideas().unwrap().is_empty());
    }

    #[test]
    fn test_header_limits() {
        let service = service_with(Arc::new(HashingEmbedder::default()));

        let long_line = format!(
            "GET /ideas HTTP/1.1\r\nX-Padding: {}\r\n\r\n",
            "a".repeat(MAX_HEADER_LINE_BYTES)
        );
        let response = exchange(&service, &long_line);
        assert!(response.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));

        let mut many = String::from("GET /ideas HTTP/1.1\r\n");
        for i in 0..=MAX_HEADERS {
            many.push_str(&format!("X-Header-{}: {}\r\n", i, i));
        }
        many.push_str("\r\n");
        let response = exchange(&service, &many);
        assert!(response.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));

        let mut fits = String::from("GET /ideas HTTP/1.1\r\n");
        for i in 0..MAX_HEADERS {
            fits.push_str(&format!("X-Header-{}: {}\r\n", i, i));
        }
        fits.push_str("\r\n");
        assert!(exchange(&service, &fits).starts_with("HTTP/1.1 200 OK\r\n"));
    }
}
