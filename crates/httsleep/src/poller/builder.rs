//! Fluent construction of a [`Poller`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use super::{Poller, DEFAULT_MAX_RETRIES, DEFAULT_POLLING_INTERVAL};
use crate::client::{HttpClient, ReqwestClient, SendOptions};
use crate::condition::{Conditions, Criterion, IntoCriteria, JsonPathCheck};
use crate::error::{BuildError, ConditionError, TransportErrorKind};
use crate::request::{build_request, Auth, RequestSource};
use crate::response::Response;

/// Collects session options; [`PollerBuilder::build`] validates them all at once.
///
/// Success conditions come either from [`until`](Self::until) or, when that
/// is not set, from the shorthand setters (`status_code`, `json`, `text`,
/// `jsonpath`, `callback`), which together form a single criterion.
pub struct PollerBuilder {
    source: RequestSource,
    until: Option<Result<Vec<Criterion>, ConditionError>>,
    alarms: Option<Result<Vec<Criterion>, ConditionError>>,
    shorthand: Criterion,
    auth: Option<Auth>,
    headers: Vec<(String, String)>,
    client: Option<Arc<dyn HttpClient>>,
    timeout: Option<Duration>,
    verify: Option<bool>,
    polling_interval: Duration,
    max_retries: Option<u32>,
    ignore_exceptions: HashSet<TransportErrorKind>,
    log_level: Level,
    cancel: Option<CancellationToken>,
}

impl PollerBuilder {
    pub(super) fn new(source: RequestSource) -> Self {
        Self {
            source,
            until: None,
            alarms: None,
            shorthand: Criterion::new(),
            auth: None,
            headers: Vec::new(),
            client: None,
            timeout: None,
            verify: None,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            ignore_exceptions: HashSet::new(),
            log_level: Level::INFO,
            cancel: None,
        }
    }

    /// Success conditions: one criterion or a list of them.
    pub fn until(mut self, until: impl IntoCriteria) -> Self {
        self.until = Some(until.into_criteria());
        self
    }

    /// Alarm conditions: one criterion or a list of them.
    pub fn alarms(mut self, alarms: impl IntoCriteria) -> Self {
        self.alarms = Some(alarms.into_criteria());
        self
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.shorthand = self.shorthand.with_status_code(code);
        self
    }

    pub fn json(mut self, json: impl Into<Value>) -> Self {
        self.shorthand = self.shorthand.with_json(json);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.shorthand = self.shorthand.with_text(text);
        self
    }

    pub fn jsonpath(mut self, check: JsonPathCheck) -> Self {
        self.shorthand = self.shorthand.with_jsonpath(check);
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.shorthand = self.shorthand.with_callback(callback);
        self
    }

    /// Credentials for a request built from a URL.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Add a header to a request built from a URL.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Use `client` instead of a fresh [`ReqwestClient`].
    pub fn client(self, client: impl HttpClient + 'static) -> Self {
        self.shared_client(Arc::new(client))
    }

    /// Use a client shared with other sessions.
    pub fn shared_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Request timeout of the default client. Ignored when a client is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `false` disables TLS certificate verification.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Retry budget; `None` retries until success or alarm.
    pub fn max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Transport error kinds that count as a failed attempt instead of ending the session.
    pub fn ignore_exceptions(mut self, kinds: impl IntoIterator<Item = TransportErrorKind>) -> Self {
        self.ignore_exceptions.extend(kinds);
        self
    }

    /// Level of the "not ready" and "ignoring exception" notices.
    pub fn log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Stop polling, with [`Outcome::Cancelled`](crate::Outcome::Cancelled),
    /// once `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Poller, BuildError> {
        let request = build_request(self.source, self.auth, &self.headers)?;

        let until = match self.until {
            Some(until) => until?,
            None if self.shorthand.is_empty() => return Err(BuildError::MissingUntil),
            None => vec![self.shorthand],
        };
        let alarms = self.alarms.transpose()?.unwrap_or_default();
        let conditions = Conditions::new(until, alarms)?;

        if self.polling_interval.is_zero() {
            return Err(BuildError::ZeroPollingInterval);
        }

        let client: Arc<dyn HttpClient> = match self.client {
            Some(client) => client,
            None => Arc::new(match self.timeout {
                Some(timeout) => ReqwestClient::with_timeout(timeout)?,
                None => ReqwestClient::new()?,
            }),
        };

        Ok(Poller {
            request,
            conditions,
            polling_interval: self.polling_interval,
            max_retries: self.max_retries,
            ignore_exceptions: self.ignore_exceptions,
            client,
            send_options: SendOptions {
                verify: self.verify,
            },
            log_level: self.log_level,
            cancel: self.cancel,
        })
    }
}
