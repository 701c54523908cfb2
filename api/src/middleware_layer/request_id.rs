use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id of the current request, also available as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn incoming_id(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    (!v.is_empty()).then(|| v.to_string())
}

fn generate_id() -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    format!("req-{nanos}")
}

/// Keeps a caller-supplied `X-Request-Id` or mints one, and echoes it on the response.
pub async fn ensure_request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = incoming_id(req.headers()).unwrap_or_else(generate_id);
    let header = HeaderValue::from_str(&id).ok();

    if let Some(h) = &header {
        req.headers_mut().insert(REQUEST_ID_HEADER, h.clone());
    }
    req.extensions_mut().insert(RequestId(id));

    let mut res = next.run(req).await;
    if let Some(h) = header {
        res.headers_mut().insert(REQUEST_ID_HEADER, h);
    }
    res
}
