//! Request descriptor and the rules for building one from user input.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Credentials attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum Auth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer {
        token: String,
    },
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer {
            token: token.into(),
        }
    }

    /// Parse `user:password` (or just `user`) as basic credentials.
    pub fn parse_basic(credentials: &str) -> Self {
        match credentials.split_once(':') {
            Some((user, password)) => Auth::basic(user, password),
            None => Auth::Basic {
                username: credentials.to_string(),
                password: None,
            },
        }
    }
}

/// Everything needed to dispatch the polled request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub auth: Option<Auth>,
    pub body: Option<Bytes>,
}

impl RequestSpec {
    /// A `GET` request for `url`.
    pub fn get(url: &str) -> Result<Self, BuildError> {
        Self::new(Method::GET, url)
    }

    pub fn new(method: Method, url: &str) -> Result<Self, BuildError> {
        Ok(Self {
            method,
            url: parse_url(url)?,
            headers: HeaderMap::new(),
            auth: None,
            body: None,
        })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, BuildError> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Where the polled request comes from.
#[derive(Debug, Clone)]
pub enum RequestSource {
    /// A URL; a `GET` request is built from it.
    Url(String),
    /// A request used as-is.
    Prepared(RequestSpec),
}

impl From<&str> for RequestSource {
    fn from(url: &str) -> Self {
        RequestSource::Url(url.to_string())
    }
}

impl From<String> for RequestSource {
    fn from(url: String) -> Self {
        RequestSource::Url(url)
    }
}

impl From<&String> for RequestSource {
    fn from(url: &String) -> Self {
        RequestSource::Url(url.clone())
    }
}

impl From<RequestSpec> for RequestSource {
    fn from(spec: RequestSpec) -> Self {
        RequestSource::Prepared(spec)
    }
}

/// Resolve a [`RequestSource`] into a [`RequestSpec`].
///
/// `auth` and `headers` are merged into a request built from a URL. A
/// prepared request already carries its own, so passing either alongside
/// one is rejected rather than silently dropped.
pub fn build_request(
    source: RequestSource,
    auth: Option<Auth>,
    headers: &[(String, String)],
) -> Result<RequestSpec, BuildError> {
    match source {
        RequestSource::Url(url) => {
            let mut spec = RequestSpec::get(&url)?;
            for (name, value) in headers {
                let (name, value) = header_pair(name, value)?;
                spec.headers.append(name, value);
            }
            spec.auth = auth;
            Ok(spec)
        }
        RequestSource::Prepared(spec) => {
            if auth.is_some() || !headers.is_empty() {
                return Err(BuildError::ConflictingRequestOptions);
            }
            Ok(spec)
        }
    }
}

/// Parse a `Name: value` header line.
pub fn parse_header_line(line: &str) -> Result<(String, String), BuildError> {
    let (name, value) = line.split_once(':').ok_or_else(|| BuildError::InvalidHeader {
        name: line.to_string(),
        reason: "expected `Name: value`".to_string(),
    })?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_url(url: &str) -> Result<Url, BuildError> {
    let parsed = Url::parse(url).map_err(|e| BuildError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(BuildError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), BuildError> {
    let invalid = |reason: String| BuildError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}
