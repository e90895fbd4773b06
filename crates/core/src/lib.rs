//! # Visit Core
//!
//! Core logic for registering a patient visit and, optionally, admitting the
//! new visit to a service queue.
//!
//! This crate contains:
//! - The visit-type catalog filter and pagination (`catalog`)
//! - The visit form state, defaults, and schema (`form`, `clock`)
//! - The required-attribute check (`attributes`)
//! - The submission state machine and its async driver (`orchestrator`, `submitter`)
//! - The mapping from terminal states to notifications and side effects (`outcome`)
//! - A per-surface facade tying these together (`workflow`)
//!
//! **No transport concerns**: HTTP clients, rendering, and notification display
//! live behind the traits in `client`.

pub mod attributes;
pub mod cancel;
pub mod catalog;
pub mod client;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod outcome;
pub mod payload;
pub mod submitter;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{SubmitRejected, VisitError, VisitResult};

pub use attributes::{AttributeCatalog, VisitAttributeType, VisitAttributeValues};
pub use cancel::{CancelSignal, CancellationHandle};
pub use catalog::{filter_visit_types, paginate, Page, VisitType, VisitTypeCatalog, VisitTypeTab};
pub use client::{
    Collaborators, CreatedVisit, NotificationSink, QueueAdmissionReceipt, QueueClient,
    QueueFieldSource, RemoteError, VisitCache, VisitClient, WorkflowSurface,
};
pub use config::WorkflowConfig;
pub use form::{FieldChange, FormErrors, FormField, VisitFormSchema, VisitFormState};
pub use orchestrator::{Step, SubmissionMachine, SubmissionState};
pub use outcome::{Notification, Outcome, OutcomeDispatcher, Severity};
pub use payload::{QueueAdmissionPayload, QueueFields, VisitCreationPayload};
pub use submitter::SubmissionReport;
pub use workflow::{EventEffect, VisitWorkflow, WorkflowContext, WorkflowEvent};
