//! The poll loop.
//!
//! One attempt is: dispatch the request, check alarms in declaration order,
//! then check the success criteria, then either stop or sleep and go again.
//! Alarms are always checked first, so a response matching both an alarm and
//! a success criterion ends the session on the alarm.

mod builder;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn, Level};

pub use builder::PollerBuilder;

use crate::client::{HttpClient, SendOptions};
use crate::condition::Conditions;
use crate::error::{PollError, TransportErrorKind};
use crate::outcome::{Alarm, Outcome};
use crate::request::{RequestSource, RequestSpec};
use crate::response::Response;

/// Seconds between attempts unless configured otherwise.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(2);

/// Retry budget unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 50;

/// A configured poll session.
///
/// Built with [`Poller::builder`], which validates everything up front.
/// Running consumes the session.
pub struct Poller {
    request: RequestSpec,
    conditions: Conditions,
    polling_interval: Duration,
    max_retries: Option<u32>,
    ignore_exceptions: HashSet<TransportErrorKind>,
    client: Arc<dyn HttpClient>,
    send_options: SendOptions,
    log_level: Level,
    cancel: Option<CancellationToken>,
}

impl Poller {
    pub fn builder(url_or_request: impl Into<RequestSource>) -> PollerBuilder {
        PollerBuilder::new(url_or_request.into())
    }

    pub fn request(&self) -> &RequestSpec {
        &self.request
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// `None` means retry forever.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn ignore_exceptions(&self) -> &HashSet<TransportErrorKind> {
        &self.ignore_exceptions
    }

    pub fn send_options(&self) -> SendOptions {
        self.send_options
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }

    /// Poll until success, returning the matching response.
    pub async fn run(self) -> Result<Response, PollError> {
        self.outcome().await?.into_result()
    }

    /// Run on a private current-thread runtime, blocking the caller.
    ///
    /// Must not be called from inside an async context.
    pub fn run_blocking(self) -> Result<Response, PollError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run())
    }

    /// Poll until a terminal outcome.
    ///
    /// Transport errors outside the ignore set and unparseable bodies are
    /// returned as `Err` immediately, without consuming a retry.
    pub async fn outcome(self) -> Result<Outcome, PollError> {
        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;

        loop {
            if self.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            attempts += 1;
            debug!(attempt = attempts, method = %self.request.method, url = %self.request.url, "Polling");

            match self.client.send(&self.request, &self.send_options).await {
                Ok(response) => {
                    debug!(attempt = attempts, status = response.status_code(), "Received response");
                    if let Some(criterion) = self.conditions.triggered_alarm(&response)? {
                        let criterion = criterion.clone();
                        return Ok(Outcome::AlarmTriggered(Alarm::new(response, criterion)));
                    }
                    if self.conditions.is_satisfied(&response)? {
                        return Ok(Outcome::Success(response));
                    }
                }
                Err(err) if self.ignore_exceptions.contains(&err.kind) => {
                    self.notice(format_args!("Ignoring exception: {err}"));
                }
                Err(err) => return Err(err.into()),
            }

            if let Some(max_retries) = self.max_retries {
                if retries >= max_retries {
                    return Ok(Outcome::RetriesExhausted { attempts });
                }
            }
            retries += 1;

            self.notice(format_args!(
                "Not ready, waiting {} seconds...",
                self.polling_interval.as_secs_f64()
            ));
            if !self.pause().await {
                return Ok(Outcome::Cancelled);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleep for the polling interval. Returns `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(self.polling_interval) => true,
                }
            }
            None => {
                tokio::time::sleep(self.polling_interval).await;
                true
            }
        }
    }

    fn notice(&self, message: fmt::Arguments<'_>) {
        let level = self.log_level;
        if level == Level::ERROR {
            error!("{message}");
        } else if level == Level::WARN {
            warn!("{message}");
        } else if level == Level::INFO {
            info!("{message}");
        } else if level == Level::DEBUG {
            debug!("{message}");
        } else {
            trace!("{message}");
        }
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("request", &self.request)
            .field("conditions", &self.conditions)
            .field("polling_interval", &self.polling_interval)
            .field("max_retries", &self.max_retries)
            .field("ignore_exceptions", &self.ignore_exceptions)
            .field("send_options", &self.send_options)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}
