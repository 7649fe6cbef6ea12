//! HTTP request/response plumbing shared by both remote clients.
//!
//! The clients build [`HttpRequest`] values and hand them to a
//! [`Transport`]. The blocking `reqwest` implementation is behind the
//! `http` feature; tests use [`crate::mock::MockTransport`].

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::result::RemoteResult;

/// HTTP verbs used by the wire protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case verb
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No payload
    #[default]
    Empty,
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// An outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Verb
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Payload
    pub body: RequestBody,
}

impl HttpRequest {
    /// Create a request without a body
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: RequestBody::Empty,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attach a form body
    #[must_use]
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    /// Value of a form field, if this is a form request
    #[must_use]
    pub fn form_field(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// A received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body text
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 with a JSON body
    #[must_use]
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// Whether the status is below 300
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 300
    }
}

/// Sends requests to a remote server
pub trait Transport {
    /// Perform one request/response exchange.
    ///
    /// # Errors
    ///
    /// [`crate::RemoteError::Transport`] when no response was received.
    /// HTTP error statuses are returned as responses.
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
        (**self).send(request)
    }
}

/// Connect timeout of the default HTTP client.
///
/// Requests themselves are not capped: server-side waits such as
/// `waitForCondition` block for their own budget, which can exceed any
/// fixed client limit.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(feature = "http")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport};
    use crate::result::{RemoteError, RemoteResult};

    /// Blocking `reqwest` transport
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        /// Client with the default connect timeout and no request cap
        #[must_use]
        pub fn new() -> Self {
            let client = reqwest::blocking::Client::builder()
                .connect_timeout(super::DEFAULT_CONNECT_TIMEOUT)
                .timeout(None)
                .build()
                .unwrap_or_default();
            Self { client }
        }

        /// Use a preconfigured client
        #[must_use]
        pub const fn with_client(client: reqwest::blocking::Client) -> Self {
            Self { client }
        }
    }

    impl Default for ReqwestTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for ReqwestTransport {
        fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
            let builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
                HttpMethod::Delete => self.client.delete(&request.url),
            };
            let builder = match &request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder
                    .header("Accept", "application/json; charset=UTF-8")
                    .json(value),
                RequestBody::Form(fields) => builder.form(fields),
            };

            let response = builder.send().map_err(|e| RemoteError::Transport {
                message: e.to_string(),
            })?;
            let status = response.status().as_u16();
            let body = response.text().map_err(|e| RemoteError::Transport {
                message: e.to_string(),
            })?;
            Ok(HttpResponse { status, body })
        }
    }
}
