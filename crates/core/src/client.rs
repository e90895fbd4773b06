//! Collaborator seams.
//!
//! The workflow talks to the outside world only through these traits:
//! - two remote calls (`VisitClient`, `QueueClient`), each with its own failure channel
//! - the sibling queue-fields surface (`QueueFieldSource`)
//! - user notifications, cache invalidation, and closing the surface
//!
//! Transport, rendering, and display mechanics live behind the implementations.

use crate::cancel::CancelSignal;
use crate::outcome::Notification;
use crate::payload::{QueueAdmissionPayload, QueueFields, VisitCreationPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use visit_types::ResourceRef;

/// A failed remote call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Transport status, when the call got far enough to receive one.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// The visit record returned by a successful visit-creation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVisit {
    pub uuid: String,
    pub visit_type: ResourceRef,
}

/// Acknowledgement of a queue-admission call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueAdmissionReceipt {
    pub status: u16,
}

impl QueueAdmissionReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait VisitClient: Send + Sync {
    async fn create_visit(
        &self,
        payload: &VisitCreationPayload,
        cancel: CancelSignal,
    ) -> Result<CreatedVisit, RemoteError>;
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn admit_to_queue(
        &self,
        payload: &QueueAdmissionPayload,
        cancel: CancelSignal,
    ) -> Result<QueueAdmissionReceipt, RemoteError>;
}

/// Reads the queue inputs from the sibling surface at the moment they are needed.
///
/// `None` means the surface does not currently expose queue fields.
pub trait QueueFieldSource: Send + Sync {
    fn queue_fields(&self) -> Option<QueueFields>;
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Invalidates cached visit data so dependent views refetch it.
pub trait VisitCache: Send + Sync {
    fn invalidate(&self, patient_uuid: &str);
}

pub trait WorkflowSurface: Send + Sync {
    fn close(&self);
}

/// Everything the submission driver needs, bundled for passing around.
#[derive(Clone)]
pub struct Collaborators {
    pub visits: Arc<dyn VisitClient>,
    pub queue: Arc<dyn QueueClient>,
    pub queue_fields: Arc<dyn QueueFieldSource>,
    pub notifications: Arc<dyn NotificationSink>,
    pub cache: Arc<dyn VisitCache>,
    pub surface: Arc<dyn WorkflowSurface>,
}
