//! Request and response shapes for the download path.

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::borrow::Cow;
use std::time::Duration;

/// A logical download request: a bare URL, or a structured form carrying
/// method, headers, body and per-request meta.
#[derive(Debug, Clone)]
pub enum FetchRequest {
    Url(String),
    Form(RequestForm),
}

impl FetchRequest {
    pub fn url(&self) -> &str {
        match self {
            FetchRequest::Url(url) => url,
            FetchRequest::Form(form) => &form.url,
        }
    }
}

impl From<&str> for FetchRequest {
    fn from(url: &str) -> Self {
        FetchRequest::Url(url.to_string())
    }
}

impl From<String> for FetchRequest {
    fn from(url: String) -> Self {
        FetchRequest::Url(url)
    }
}

impl From<RequestForm> for FetchRequest {
    fn from(form: RequestForm) -> Self {
        FetchRequest::Form(form)
    }
}

/// Structured request. Fields set here win over the corresponding
/// `FetchOptions` fields when both are present.
#[derive(Debug, Clone, Default)]
pub struct RequestForm {
    pub url: String,
    /// Explicit method; when absent, POST if a body is present, else GET.
    pub method: Option<Method>,
    pub headers: HeaderMap,
    /// Query-string pairs.
    pub params: Option<Vec<(String, String)>>,
    /// Form-encoded body pairs.
    pub data: Option<Vec<(String, String)>>,
    /// JSON body.
    pub json: Option<serde_json::Value>,
    /// Return non-2xx responses as-is instead of raising.
    pub keep_status_code: Option<bool>,
}

impl RequestForm {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn data(mut self, data: Vec<(String, String)>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn keep_status_code(mut self, keep: bool) -> Self {
        self.keep_status_code = Some(keep);
        self
    }
}

/// Per-call transport options. The downloader recognizes exactly these
/// fields; anything else the transport supports is deliberately not
/// expressible here.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub params: Option<Vec<(String, String)>>,
    pub data: Option<Vec<(String, String)>>,
    pub json: Option<serde_json::Value>,
    pub headers: Option<HeaderMap>,
    /// Overrides the configured timeout for this call, same clamping rules.
    pub timeout: Option<Duration>,
    pub keep_status_code: Option<bool>,
}

/// Outcome of one logical download.
#[derive(Debug)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Identity of the proxy that served the request, when one was used.
    pub proxy: Option<(String, String)>,
}

impl FetchResponse {
    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
