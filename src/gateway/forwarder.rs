//! HTTP request forwarding to resolved backends

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        Method, StatusCode,
    },
    response::Response,
};
use http_body_util::LengthLimitError;
use reqwest::{redirect, Client};
use tracing::{debug, warn};

use crate::config::ForwardConfig;
use crate::error::{AppError, Result};

/// Path prefix under which proxied services are mounted
pub const PROXY_PREFIX: &str = "/api/";

/// Marker header added to every forwarded request
pub const FORWARDED_BY_HEADER: &str = "x-forwarded-by";
pub const FORWARDED_BY_VALUE: &str = "service-gateway";

/// Relays requests to a backend and relays the response back unchanged.
///
/// Bodies travel as raw bytes in both directions; redirects are returned to the
/// caller rather than followed.
pub struct Forwarder {
    client: Client,
    max_body_bytes: usize,
}

impl Forwarder {
    /// Create a new forwarder from configuration
    pub fn new(config: &ForwardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Forward `request` (addressed to `/api/<service_name>/...`) to `target_base_url`
    pub async fn forward(
        &self,
        request: Request,
        service_name: &str,
        target_base_url: &str,
    ) -> Result<Response> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = rewrite_target(target_base_url, service_name, path_and_query);

        if let Some(length) = content_length(&parts.headers) {
            if length > self.max_body_bytes {
                return Err(AppError::PayloadTooLarge(self.max_body_bytes));
            }
        }

        let body = to_bytes(body, self.max_body_bytes).await.map_err(|e| {
            let inner = e.into_inner();
            if inner.is::<LengthLimitError>() {
                AppError::PayloadTooLarge(self.max_body_bytes)
            } else {
                AppError::InvalidRequest(format!("Failed to read request body: {}", inner))
            }
        })?;

        let headers = outbound_headers(&parts.headers);
        let is_head = parts.method == Method::HEAD;

        debug!(
            service = %service_name,
            method = %parts.method,
            target = %target,
            body_bytes = body.len(),
            "Forwarding request"
        );

        let response = self
            .client
            .request(parts.method, &target)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(service = %service_name, target = %target, error = %e, "Forward failed");
                AppError::ForwardError(describe(&e, &target))
            })?;

        let status = response.status();
        let response_headers = relayed_headers(response.headers(), is_head || !has_body(status));

        let bytes = response.bytes().await.map_err(|e| {
            warn!(service = %service_name, target = %target, error = %e, "Reading backend response failed");
            AppError::ForwardError(describe(&e, &target))
        })?;

        debug!(
            service = %service_name,
            status = status.as_u16(),
            body_bytes = bytes.len(),
            "Backend responded"
        );

        Ok(build_response(status, response_headers, Body::from(bytes)))
    }
}

/// Extract the service name from a `/api/<service>/...` path
pub fn split_service_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(PROXY_PREFIX)?;
    let service = rest.split('/').next().unwrap_or_default();
    if service.is_empty() {
        None
    } else {
        Some(service)
    }
}

/// Strip `/api/<service>` from `path_and_query` and append the remainder to `base_url`.
///
/// `/api/files/abc123?x=1` against `http://localhost:4000` yields
/// `http://localhost:4000/abc123?x=1`.
pub fn rewrite_target(base_url: &str, service_name: &str, path_and_query: &str) -> String {
    let prefix = format!("{}{}", PROXY_PREFIX, service_name);
    let rest = path_and_query
        .strip_prefix(prefix.as_str())
        .unwrap_or(path_and_query);

    let base = base_url.trim_end_matches('/');
    if rest.starts_with('/') {
        format!("{}{}", base, rest)
    } else {
        format!("{}/{}", base, rest)
    }
}

/// Check if header is hop-by-hop (should not be forwarded)
fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Header names listed in the `Connection` header are hop-by-hop too
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn filtered(headers: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if is_hop_by_hop_header(name)
            || extra.contains(name)
            || listed.iter().any(|l| l == name.as_str())
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out
}

/// Inbound headers minus connection/host specifics, plus the gateway marker
fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = filtered(inbound, &[header::HOST, header::CONTENT_LENGTH]);

    if let Some(host) = inbound.get(header::HOST) {
        headers.insert(HeaderName::from_static("x-forwarded-host"), host.clone());
    }
    headers.insert(
        HeaderName::from_static(FORWARDED_BY_HEADER),
        HeaderValue::from_static(FORWARDED_BY_VALUE),
    );

    headers
}

/// Backend response headers to hand back to the caller.
///
/// Content-Length is recomputed from the buffered body, except for responses
/// that carry none (HEAD, 204, 304) where the backend's value is the only one.
fn relayed_headers(backend: &HeaderMap, keep_length: bool) -> HeaderMap {
    if keep_length {
        filtered(backend, &[])
    } else {
        filtered(backend, &[header::CONTENT_LENGTH])
    }
}

fn has_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn describe(error: &reqwest::Error, target: &str) -> String {
    if error.is_timeout() {
        format!("Timed out waiting for {}", target)
    } else if error.is_connect() {
        format!("Connection failed to {}", target)
    } else {
        format!("Error communicating with {}: {}", target, error)
    }
}
