//! Poll an HTTP endpoint until its response matches a success condition.
//!
//! A session sends the same request at a fixed interval. Each response is
//! checked against the alarm conditions first, then against the success
//! conditions. The session ends on the first alarm, the first success, when
//! the retry budget runs out, or on a transport error that is not ignored.
//!
//! ```no_run
//! use httsleep::{Criterion, JsonPathCheck, Poller};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let response = Poller::builder("https://api.example.com/jobs/42")
//!     .until(Criterion::new().with_jsonpath(JsonPathCheck::new("status", "SUCCESS")?))
//!     .alarms([
//!         Criterion::status(500),
//!         Criterion::new().with_jsonpath(JsonPathCheck::new("status", "FAILED")?),
//!     ])
//!     .build()?
//!     .run()
//!     .await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod outcome;
pub mod poller;
pub mod request;
pub mod response;

pub use client::{HttpClient, ReqwestClient, SendOptions, DEFAULT_TIMEOUT};
pub use condition::{
    compile_path, matches, normalize, Conditions, Criterion, Field, IntoCriteria, JsonPathCheck,
    PathQuery, Role,
};
pub use config::{ConfigError, PollConfig};
pub use error::{
    BuildError, ConditionError, Error, EvaluationError, PollError, TransportError,
    TransportErrorKind,
};
pub use outcome::{Alarm, Outcome};
pub use poller::{Poller, PollerBuilder, DEFAULT_MAX_RETRIES, DEFAULT_POLLING_INTERVAL};
pub use request::{Auth, RequestSource, RequestSpec};
pub use response::Response;

/// Poll `url_or_request` with default settings until `until` matches.
///
/// Shorthand for `Poller::builder(url_or_request).until(until).build()?.run()`.
pub async fn httsleep(
    url_or_request: impl Into<RequestSource>,
    until: impl IntoCriteria,
) -> Result<Response, Error> {
    let poller = Poller::builder(url_or_request).until(until).build()?;
    Ok(poller.run().await?)
}
