//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a request ID for every inbound request
//! - Translate an inbound request into the outbound upstream request
//!
//! # Design Decisions
//! - Translation is pure: the inbound parts are borrowed, never mutated
//! - The credential is injected here and nowhere else
//! - The inbound body is buffered so a throttled request can be resent

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::Method;
use bytes::Bytes;
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::config::{AuthMode, UpstreamConfig};
use crate::security::headers::strip_hop_by_hop;

/// Request ID header name.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Query parameter carrying the credential in [`AuthMode::Query`].
pub const API_KEY_PARAM: &str = "api_key";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Extract the request ID attached by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Error type for request translation.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid upstream url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("credential is not a valid header value")]
    InvalidCredential,
    #[error("path {path:?} resolves outside the upstream base")]
    OutsideBase { path: String },
}

/// A request ready to be sent upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    /// The target URL with the credential query parameter masked, for logs.
    pub fn redacted_url(&self) -> String {
        if !self.url.query_pairs().any(|(k, _)| k == API_KEY_PARAM) {
            return self.url.to_string();
        }
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == API_KEY_PARAM { "***".into() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

/// Rewrites inbound requests to target the upstream with the credential
/// injected.
#[derive(Debug, Clone)]
pub struct RequestTranslator {
    base_url: String,
    /// Path of `base_url` with a trailing `/`, or `None` if it does not parse.
    base_prefix: Option<String>,
    api_key: String,
    auth_mode: AuthMode,
}

impl RequestTranslator {
    pub fn new(upstream: &UpstreamConfig) -> Self {
        let base_url = upstream.base_url();
        let base_prefix = Url::parse(&base_url)
            .ok()
            .map(|url| format!("{}/", url.path().trim_end_matches('/')));
        Self {
            base_url,
            base_prefix,
            api_key: upstream.api_key.clone(),
            auth_mode: upstream.auth_mode,
        }
    }

    /// Build the outbound request for `parts` and its buffered `body`.
    ///
    /// The URL is `base + path`, followed by the inbound query unchanged and,
    /// in query mode, the credential parameter. Dot segments, literal or
    /// percent-encoded, are resolved while parsing; a path that resolves
    /// outside the base is refused so the credential never leaves it.
    pub fn translate(&self, parts: &Parts, body: Bytes) -> Result<OutboundRequest, TranslateError> {
        let mut target = String::with_capacity(self.base_url.len() + 64);
        target.push_str(&self.base_url);
        target.push_str(parts.uri.path());
        if let Some(query) = parts.uri.query().filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }

        let mut url = Url::parse(&target).map_err(|source| TranslateError::InvalidUrl {
            url: target.clone(),
            source,
        })?;

        let inside = match &self.base_prefix {
            Some(prefix) => url.path().starts_with(prefix.as_str()),
            None => false,
        };
        if !inside {
            return Err(TranslateError::OutsideBase {
                path: parts.uri.path().to_string(),
            });
        }

        let mut headers = parts.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        match self.auth_mode {
            AuthMode::Header => {
                let value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                    .map_err(|_| TranslateError::InvalidCredential)?;
                headers.insert(header::AUTHORIZATION, value);
            }
            AuthMode::Query => {
                url.query_pairs_mut().append_pair(API_KEY_PARAM, &self.api_key);
            }
        }

        Ok(OutboundRequest {
            method: parts.method.clone(),
            url,
            headers,
            body,
        })
    }
}
