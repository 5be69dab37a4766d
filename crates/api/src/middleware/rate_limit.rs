//! Rate admission filter.
//!
//! Runs before routing for every request. The client is identified by the
//! first `X-Forwarded-For` entry, else the peer address, else `unknown`;
//! the endpoint by `METHOD:path`.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, OriginalUri, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use genhub_pipeline::Admission;

use crate::error::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client_id = client_id(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );
    let endpoint = endpoint_key(&request);

    match state.rate_limiter.check(&client_id, &endpoint).await {
        Admission::Allow => next.run(request).await,
        Admission::Deny(window) => AppError::RateLimited(window).into_response(),
    }
}

fn client_id(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(ConnectInfo(addr))) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn endpoint_key(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path())
        .unwrap_or_else(|| request.uri().path());
    format!("{}:{}", request.method(), path)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000)));
        assert_eq!(client_id(&headers, Some(&peer)), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([192, 168, 1, 4], 5000)));
        assert_eq!(client_id(&headers, Some(&peer)), "192.168.1.4");
        assert_eq!(client_id(&headers, None), "unknown");
    }

    #[test]
    fn endpoint_is_method_and_path() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/generate/text-to-image?x=1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(endpoint_key(&request), "POST:/api/v1/generate/text-to-image");
    }
}
