//! Offline collaborators for `visit simulate`.
//!
//! Each remote call prints the JSON it would send and answers from the command
//! line flags instead of a server.

use async_trait::async_trait;
use visit_core::outcome::Notification;
use visit_core::payload::{QueueAdmissionPayload, QueueFields, VisitCreationPayload};
use visit_core::{
    CancelSignal, CreatedVisit, NotificationSink, QueueAdmissionReceipt, QueueClient,
    QueueFieldSource, RemoteError, VisitCache, VisitClient, VisitType, WorkflowSurface,
};
use visit_types::ResourceRef;

pub struct DryRunVisits {
    pub catalog: Vec<VisitType>,
    pub fail_with: Option<String>,
}

#[async_trait]
impl VisitClient for DryRunVisits {
    async fn create_visit(
        &self,
        payload: &VisitCreationPayload,
        _cancel: CancelSignal,
    ) -> Result<CreatedVisit, RemoteError> {
        let body = payload.to_json().map_err(|e| RemoteError::new(e.to_string()))?;
        println!("POST visit\n{body:#}");

        if let Some(message) = &self.fail_with {
            return Err(RemoteError::new(message.clone()));
        }

        let visit_type = self
            .catalog
            .iter()
            .find(|vt| vt.uuid == payload.visit_type())
            .map(|vt| ResourceRef::new(&vt.uuid, &vt.display))
            .unwrap_or_else(|| ResourceRef {
                uuid: payload.visit_type().to_owned(),
                display: None,
            });

        Ok(CreatedVisit {
            uuid: uuid::Uuid::new_v4().to_string(),
            visit_type,
        })
    }
}

pub struct DryRunQueue {
    pub fail_with: Option<String>,
}

#[async_trait]
impl QueueClient for DryRunQueue {
    async fn admit_to_queue(
        &self,
        payload: &QueueAdmissionPayload,
        _cancel: CancelSignal,
    ) -> Result<QueueAdmissionReceipt, RemoteError> {
        let body = payload.to_json().map_err(|e| RemoteError::new(e.to_string()))?;
        println!("POST queue entry\n{body:#}");

        match &self.fail_with {
            Some(message) => Err(RemoteError::new(message.clone())),
            None => Ok(QueueAdmissionReceipt { status: 201 }),
        }
    }
}

pub struct FileQueueFields(pub Option<QueueFields>);

impl QueueFieldSource for FileQueueFields {
    fn queue_fields(&self) -> Option<QueueFields> {
        self.0.clone()
    }
}

/// Prints side effects as they happen.
pub struct ConsoleSurface;

impl NotificationSink for ConsoleSurface {
    fn notify(&self, notification: &Notification) {
        println!(
            "[{:?}] {}: {}",
            notification.severity, notification.title, notification.message
        );
    }
}

impl VisitCache for ConsoleSurface {
    fn invalidate(&self, patient_uuid: &str) {
        println!("refresh visits for patient {patient_uuid}");
    }
}

impl WorkflowSurface for ConsoleSurface {
    fn close(&self) {
        println!("close visit form");
    }
}
