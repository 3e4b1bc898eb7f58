//! Terminal outcomes of a poll session.

use std::fmt;

use crate::condition::Criterion;
use crate::error::PollError;
use crate::response::Response;

/// An alarm criterion matched a response.
///
/// Carries the offending response and the criterion that fired so callers
/// can report why polling stopped.
#[derive(Debug, Clone)]
pub struct Alarm {
    pub response: Response,
    pub criterion: Criterion,
}

impl Alarm {
    pub fn new(response: Response, criterion: Criterion) -> Self {
        Self {
            response,
            criterion,
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response matched an error condition: {} (status {})",
            self.criterion,
            self.response.status_code()
        )
    }
}

impl std::error::Error for Alarm {}

/// How a session ended when it ended on one of its own conditions.
///
/// Transport and evaluation failures are not outcomes; they abort the
/// session as [`PollError`]s.
#[derive(Debug)]
pub enum Outcome {
    Success(Response),
    AlarmTriggered(Alarm),
    RetriesExhausted { attempts: u32 },
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Turn anything but success into a [`PollError`].
    pub fn into_result(self) -> Result<Response, PollError> {
        match self {
            Outcome::Success(response) => Ok(response),
            Outcome::AlarmTriggered(alarm) => Err(alarm.into()),
            Outcome::RetriesExhausted { attempts } => Err(PollError::RetriesExhausted { attempts }),
            Outcome::Cancelled => Err(PollError::Cancelled),
        }
    }
}
