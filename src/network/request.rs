//! Request description independent of the HTTP client

use std::collections::BTreeMap;

use serde_json::Value;
use url::Url;

use crate::error::{Result, TransportError};

/// HTTP request method
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// CONNECT
    Connect,
    /// DELETE
    Delete,
    /// GET
    #[default]
    Get,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// PATCH
    Patch,
    /// POST
    Post,
    /// PUT
    Put,
    /// TRACE
    Trace,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Whether URL-encoded parameters go into the query string rather than the body
    fn encodes_in_url(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head | HttpMethod::Delete)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Connect => reqwest::Method::CONNECT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Trace => reqwest::Method::TRACE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How request parameters are encoded
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterEncoding {
    /// Query string for GET, HEAD and DELETE; form body for every other method
    #[default]
    Url,
    /// Always the query string
    QueryString,
    /// JSON object body
    Json,
}

/// One HTTP request relative to the client's base URL
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    /// Path appended to the base URL, `/`-separated
    pub path: String,
    /// Request method
    pub method: HttpMethod,
    /// Parameters, placed according to `encoding`
    pub parameters: BTreeMap<String, Value>,
    /// Extra headers; a later value for the same name replaces an earlier one
    pub headers: BTreeMap<String, String>,
    /// How `parameters` are sent
    pub encoding: ParameterEncoding,
}

impl Request {
    /// Request with the given method and path, no parameters or headers
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            ..Default::default()
        }
    }

    /// Plain GET of a file path (what every dataset download uses)
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Add a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Change the parameter encoding
    pub fn with_encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Absolute URL of this request
    ///
    /// Each `/`-separated part of the path is appended as one percent-encoded
    /// segment. Empty parts are ignored; `.` and `..` are rejected.
    pub fn url(&self, base: &Url) -> Result<Url> {
        let invalid = |reason: &str| TransportError::InvalidUrl {
            path: self.path.clone(),
            reason: reason.to_string(),
        };

        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("base URL cannot have path segments"))?;
            segments.pop_if_empty();
            for segment in self.path.split('/').filter(|s| !s.is_empty()) {
                if segment == "." || segment == ".." {
                    return Err(invalid("relative path segments are not allowed").into());
                }
                segments.push(segment);
            }
        }

        let in_query = match self.encoding {
            ParameterEncoding::QueryString => true,
            ParameterEncoding::Url => self.method.encodes_in_url(),
            ParameterEncoding::Json => false,
        };
        if in_query && !self.parameters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in self.form_pairs() {
                pairs.append_pair(&name, &value);
            }
        }

        Ok(url)
    }

    /// Build the request on `client`
    pub(crate) fn build(&self, client: &reqwest::Client, base: &Url) -> Result<reqwest::RequestBuilder> {
        let url = self.url(base)?;
        let mut builder = client.request(self.method.into(), url);

        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !self.parameters.is_empty() {
            builder = match self.encoding {
                ParameterEncoding::Json => builder.json(&self.parameters),
                ParameterEncoding::Url if !self.method.encodes_in_url() => {
                    builder.form(&self.form_pairs())
                }
                _ => builder,
            };
        }

        Ok(builder)
    }

    fn form_pairs(&self) -> Vec<(String, String)> {
        self.parameters
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect()
    }
}
