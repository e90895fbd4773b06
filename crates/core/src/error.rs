use crate::form::FormErrors;

#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid clock time {0:?} (expected h:mm on a 12-hour clock)")]
    InvalidClockTime(String),
    #[error("invalid start date/time: {date} {hours:02}:{minutes:02}")]
    InvalidStartDatetime {
        date: chrono::NaiveDate,
        hours: u32,
        minutes: u32,
    },
    #[error("failed to serialize payload: {0}")]
    Serialization(serde_json::Error),
}

pub type VisitResult<T> = std::result::Result<T, VisitError>;

/// Reasons a submit request is refused before any state transition happens.
///
/// None of these reach the remote service; they describe why the submit control
/// should not have been enabled in the first place.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("the form has {} invalid field(s)", .0.len())]
    FormInvalid(FormErrors),
    #[error("saving is blocked because part of the form failed to load")]
    SavingBlocked,
    #[error("the visit form has been closed")]
    Closed,
    #[error("could not build the visit request: {0}")]
    InvalidPayload(String),
}
