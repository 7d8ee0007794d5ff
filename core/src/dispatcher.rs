//! Generic request/response helper shared by every API call.
//!
//! # Design
//! `Dispatcher` owns the base URL, a shared [`Session`] and a [`Transport`].
//! Building a request reads the token synchronously and produces a complete
//! `HttpRequest` before anything is awaited, so no session state is read
//! after suspension. Parsing validates the `{success, data, error}` envelope
//! into an [`ApiResponse`]; no codec is applied at this layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, GENERIC_FAILURE};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestOptions};
use crate::session::Session;
use crate::transport::Transport;

/// Paths that never carry the bearer token.
pub const PUBLIC_PATHS: [&str; 2] = ["/auth/admin/login", "/auth/callback"];

/// A 2xx response envelope, validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// `success: true`; `data` is `None` when absent or null.
    Success { data: Option<Value> },
    /// `success` false or missing.
    Failure { error: Option<String> },
}

impl ApiResponse {
    /// Payload of a successful response that carries data.
    pub fn into_data(self) -> Option<Value> {
        match self {
            ApiResponse::Success { data } => data,
            ApiResponse::Failure { .. } => None,
        }
    }

    /// Back to the wire envelope, for pass-through callers.
    pub fn into_body(self) -> Value {
        let mut body = serde_json::Map::new();
        match self {
            ApiResponse::Success { data } => {
                body.insert("success".to_string(), Value::Bool(true));
                if let Some(data) = data {
                    body.insert("data".to_string(), data);
                }
            }
            ApiResponse::Failure { error } => {
                body.insert("success".to_string(), Value::Bool(false));
                if let Some(error) = error {
                    body.insert("error".to_string(), Value::String(error));
                }
            }
        }
        Value::Object(body)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<Envelope> for ApiResponse {
    fn from(envelope: Envelope) -> Self {
        if envelope.success {
            ApiResponse::Success {
                data: envelope.data.filter(|d| !d.is_null()),
            }
        } else {
            ApiResponse::Failure {
                error: envelope.error,
            }
        }
    }
}

/// Whether requests to `path` may carry the bearer token.
pub fn sends_token(path: &str) -> bool {
    let route = path.split(['?', '#']).next().unwrap_or(path);
    !PUBLIC_PATHS.contains(&route)
}

pub struct Dispatcher<T> {
    base_url: String,
    session: Arc<Session>,
    transport: T,
}

impl<T> Dispatcher<T> {
    pub fn new(base_url: &str, session: Arc<Session>, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Assemble the effective request for `path`.
    ///
    /// Headers start with `content-type: application/json`; caller headers
    /// replace same-named defaults; the bearer token is attached last unless
    /// the path is public.
    pub fn build_request(&self, path: &str, options: RequestOptions) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        for (name, value) in options.headers {
            merge_header(&mut headers, name.to_ascii_lowercase(), value);
        }

        if sends_token(path) {
            if let Some(token) = self.session.token()? {
                merge_header(&mut headers, "authorization".to_string(), format!("Bearer {token}"));
            }
        }

        Ok(HttpRequest {
            method: options.method,
            url: format!("{}{path}", self.base_url),
            headers,
            body: options.body,
        })
    }

    /// Validate a raw response: JSON body, 2xx status, then envelope.
    pub fn parse_response(&self, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        parse_response(response)
    }
}

impl<T: Transport> Dispatcher<T> {
    /// Perform one exchange. Failures are logged and returned; never retried.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let request = self.build_request(path, options)?;
        let method = request.method;
        tracing::debug!(%method, path, "dispatching request");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%method, path, error = %e, "request failed in transport");
                return Err(ApiError::Request {
                    status: None,
                    message: e.to_string(),
                });
            }
        };

        parse_response(response).inspect_err(|e| {
            tracing::error!(%method, path, status = e.status(), error = %e, "request failed");
        })
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::new(HttpMethod::Get)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        let options = RequestOptions::new(HttpMethod::Post).body(to_json(body)?);
        self.request(path, options).await
    }

    /// POST without a body.
    pub async fn post_empty(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::new(HttpMethod::Post)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        let options = RequestOptions::new(HttpMethod::Put).body(to_json(body)?);
        self.request(path, options).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::new(HttpMethod::Delete)).await
    }
}

fn merge_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
        Some(existing) => existing.1 = value,
        None => headers.push((name, value)),
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))
}

/// Map a raw response onto the envelope, or onto `ApiError::Request`.
pub fn parse_response(response: HttpResponse) -> Result<ApiResponse, ApiError> {
    let status = response.status;
    let body: Value = serde_json::from_str(&response.body).map_err(|e| ApiError::Request {
        status: Some(status),
        message: if response.is_success() {
            format!("invalid JSON in response body: {e}")
        } else {
            GENERIC_FAILURE.to_string()
        },
    })?;

    if !response.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_FAILURE)
            .to_string();
        return Err(ApiError::Request {
            status: Some(status),
            message,
        });
    }

    match body.get("success") {
        Some(Value::Bool(true)) => {
            let envelope: Envelope = serde_json::from_value(body)
                .map_err(|e| ApiError::Deserialization(format!("malformed response envelope: {e}")))?;
            Ok(envelope.into())
        }
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(ApiResponse::Failure {
            error: body.get("error").and_then(Value::as_str).map(str::to_string),
        }),
        Some(other) => Err(ApiError::Deserialization(format!(
            "response `success` flag is not a boolean: {other}"
        ))),
    }
}
