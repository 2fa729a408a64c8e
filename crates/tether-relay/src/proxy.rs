//! HTTP fallback: a placeholder page, or a reverse proxy to a live asset
//! server when `relay.asset_proxy` is set.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tether_common::RelayError;

use crate::server::RelayState;

/// Largest request body forwarded upstream.
const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

const PLACEHOLDER: &str = "<!doctype html>\n<html><head><title>tether</title></head>\
<body><p>tether relay is running. Connect a remote client over WebSocket.</p></body></html>\n";

pub(crate) async fn placeholder() -> Html<&'static str> {
    Html(PLACEHOLDER)
}

pub(crate) async fn proxy_assets(State(state): State<Arc<RelayState>>, req: Request) -> Response {
    match forward(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "asset proxy failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn forward(state: &RelayState, req: Request) -> Result<Response, RelayError> {
    let target = state
        .config
        .proxy_target()
        .ok_or_else(|| RelayError::Proxy("no asset proxy configured".into()))?;

    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", target.trim_end_matches('/'), path);

    let body = to_bytes(body, MAX_PROXY_BODY)
        .await
        .map_err(|e| RelayError::Proxy(format!("request body: {e}")))?;

    tracing::trace!(method = %parts.method, url = %url, "proxying asset request");
    let upstream = state
        .http
        .request(parts.method, &url)
        .headers(strip_hop_by_hop(parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| RelayError::Proxy(format!("{url}: {e}")))?;

    let status = upstream.status();
    let mut headers = strip_hop_by_hop(upstream.headers().clone());
    // CORS is answered by the relay's own layer.
    drop_cors_headers(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in [
        header::CONNECTION,
        header::HOST,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers
}

fn drop_cors_headers(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in names {
        headers.remove(name);
    }
}
