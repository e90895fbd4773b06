//! Constants used throughout the visit core crate.
//!
//! Notification texts live here so the outcome mapping and its tests agree on
//! a single wording.

/// Default number of visit types shown per catalog page.
pub const DEFAULT_VISIT_TYPES_PAGE_SIZE: usize = 5;

/// Accepted 12-hour clock input, e.g. `2:30` or `02:30`.
pub const CLOCK_TIME_PATTERN: &str = r"^(1[0-2]|0?[1-9]):([0-5]?[0-9])$";

/// Wire format for visit start timestamps (local wall-clock time).
pub const START_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Content switcher position showing recommended visit types.
pub const RECOMMENDED_TAB_INDEX: u8 = 0;

/// Content switcher position showing every configured visit type.
pub const ALL_TAB_INDEX: u8 = 1;

pub const VISIT_STARTED_TITLE: &str = "Visit started";
pub const QUEUE_ADDED_MESSAGE: &str = "Patient has been added to the queue successfully.";
pub const QUEUE_ENTRY_ERROR_TITLE: &str = "Error adding patient to the queue";
pub const QUEUE_ADMISSION_CANCELLED_MESSAGE: &str =
    "The form was closed before the patient was added to the queue.";
pub const START_VISIT_ERROR_TITLE: &str = "Error starting visit";
pub const MISSING_ATTRIBUTES_TITLE: &str = "Missing required attributes";

pub const PARTIAL_LOAD_TITLE: &str = "Part of the form did not load";
pub const PARTIAL_LOAD_MESSAGE: &str = "Please refresh to try again";
