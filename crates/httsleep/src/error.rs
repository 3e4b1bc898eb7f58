//! Error types for condition construction, session building and polling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::{Field, Role};
use crate::outcome::Alarm;

/// Errors raised while normalizing user-supplied criteria.
#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("Invalid key \"{key}\" in condition: {condition}")]
    InvalidKey { key: String, condition: String },
    #[error("Invalid status_code {value} in condition: {condition}")]
    InvalidStatusCode { value: String, condition: String },
    #[error("Invalid value for \"{field}\": {reason}")]
    InvalidValue { field: Field, reason: String },
    #[error("Invalid JSONPath expression \"{expression}\": {reason}")]
    InvalidJsonPath { expression: String, reason: String },
    #[error("Condition must be an object or a list of objects, got: {0}")]
    InvalidShape(String),
    #[error("No valid {role} conditions provided")]
    Empty { role: Role },
}

/// Errors raised while building a [`Poller`](crate::Poller).
///
/// All of these surface from `build()`, before any request is sent.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error(
        "No success conditions provided! Either `until` or one of the individual \
         condition fields (status_code, json, jsonpath, text, callback) must be provided"
    )]
    MissingUntil,
    #[error("Invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid header \"{name}\": {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("auth and headers cannot be combined with a prepared request; set them on the RequestSpec")]
    ConflictingRequestOptions,
    #[error("polling_interval must be a positive number of seconds")]
    ZeroPollingInterval,
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Category of a transport failure.
///
/// The `ignore_exceptions` option of a session is a set of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The request or connection timed out.
    Timeout,
    /// The request failed while being sent.
    Request,
    /// Too many redirects or a redirect loop.
    Redirect,
    /// Reading the response body failed.
    Body,
    /// The response could not be decoded.
    Decode,
    /// The client rejected the request before sending it.
    Builder,
    /// Anything the client could not classify.
    Other,
}

impl TransportErrorKind {
    pub const ALL: [TransportErrorKind; 8] = [
        TransportErrorKind::Connect,
        TransportErrorKind::Timeout,
        TransportErrorKind::Request,
        TransportErrorKind::Redirect,
        TransportErrorKind::Body,
        TransportErrorKind::Decode,
        TransportErrorKind::Builder,
        TransportErrorKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Redirect => "redirect",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Decode => "decode",
            TransportErrorKind::Builder => "builder",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!(
                    "unknown transport error kind '{s}', expected one of: {}",
                    valid.join(", ")
                )
            })
    }
}

/// A failure reported by the [`HttpClient`](crate::HttpClient) while dispatching a request.
#[derive(Error, Debug, Clone)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_redirect() {
            TransportErrorKind::Redirect
        } else if err.is_body() {
            TransportErrorKind::Body
        } else if err.is_decode() {
            TransportErrorKind::Decode
        } else if err.is_builder() {
            TransportErrorKind::Builder
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Errors raised while checking a response against a criterion.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Terminal failures of [`Poller::run`](crate::Poller::run).
#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Alarm(Box<Alarm>),
    #[error("Maximum number of retries reached after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("Polling was cancelled")]
    Cancelled,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("Failed to start the blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl PollError {
    /// The triggered alarm, if this session ended on one.
    pub fn alarm(&self) -> Option<&Alarm> {
        match self {
            PollError::Alarm(alarm) => Some(alarm),
            _ => None,
        }
    }
}

impl From<Alarm> for PollError {
    fn from(alarm: Alarm) -> Self {
        PollError::Alarm(Box::new(alarm))
    }
}

/// Errors from the one-call [`httsleep`](crate::httsleep) wrapper.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Poll(#[from] PollError),
}
