//! Hand-written fakes for the async tests.

use crate::cancel::{CancelSignal, CancellationHandle};
use crate::client::{
    Collaborators, CreatedVisit, NotificationSink, QueueAdmissionReceipt, QueueClient,
    QueueFieldSource, RemoteError, VisitCache, VisitClient, WorkflowSurface,
};
use crate::outcome::{Notification, Severity};
use crate::payload::{QueueAdmissionPayload, QueueFields, VisitCreationPayload};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use visit_types::ResourceRef;

pub(crate) fn created_visit(uuid: &str) -> CreatedVisit {
    CreatedVisit {
        uuid: uuid.into(),
        visit_type: ResourceRef::new("vt-1", "Outpatient Visit"),
    }
}

pub(crate) fn receipt(status: u16) -> QueueAdmissionReceipt {
    QueueAdmissionReceipt { status }
}

pub(crate) fn sample_queue_fields() -> QueueFields {
    QueueFields {
        service: "svc-triage".into(),
        priority: "prio-normal".into(),
        status: "status-waiting".into(),
        sort_weight: 0.0,
        queue_location: Some("loc-1".into()),
    }
}

/// A signal whose handle is already gone, so it never fires.
pub(crate) fn never_cancelled() -> CancelSignal {
    CancellationHandle::new().signal()
}

/// Holds a fake remote call open until the test releases it.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub(crate) struct FakeVisitClient {
    result: Result<CreatedVisit, RemoteError>,
    gate: Option<Gate>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl VisitClient for FakeVisitClient {
    async fn create_visit(
        &self,
        _payload: &VisitCreationPayload,
        _cancel: CancelSignal,
    ) -> Result<CreatedVisit, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.result.clone()
    }
}

pub(crate) struct FakeQueueClient {
    result: Result<QueueAdmissionReceipt, RemoteError>,
    gate: Option<Gate>,
    payloads: Mutex<Vec<QueueAdmissionPayload>>,
    pub calls: AtomicUsize,
}

impl FakeQueueClient {
    pub fn last_visit_uuid(&self) -> Option<String> {
        self.payloads
            .lock()
            .unwrap()
            .last()
            .map(|p| p.visit_uuid().to_owned())
    }
}

#[async_trait]
impl QueueClient for FakeQueueClient {
    async fn admit_to_queue(
        &self,
        payload: &QueueAdmissionPayload,
        _cancel: CancelSignal,
    ) -> Result<QueueAdmissionReceipt, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.result.clone()
    }
}

pub(crate) struct FixedQueueFields(pub Option<QueueFields>);

impl QueueFieldSource for FixedQueueFields {
    fn queue_fields(&self) -> Option<QueueFields> {
        self.0.clone()
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
    pub refreshes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RecordingSink {
    pub fn severities(&self) -> Vec<Severity> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.severity)
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        self.notifications.lock().unwrap().push(notification.clone());
    }
}

impl VisitCache for RecordingSink {
    fn invalidate(&self, _patient_uuid: &str) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

impl WorkflowSurface for RecordingSink {
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct Harness {
    pub visits: Arc<FakeVisitClient>,
    pub queue: Arc<FakeQueueClient>,
    pub fields: Arc<FixedQueueFields>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(
        visit: Result<CreatedVisit, RemoteError>,
        queue: Result<QueueAdmissionReceipt, RemoteError>,
        fields: Option<QueueFields>,
    ) -> Self {
        Self {
            visits: Arc::new(FakeVisitClient {
                result: visit,
                gate: None,
                calls: AtomicUsize::new(0),
            }),
            queue: Arc::new(FakeQueueClient {
                result: queue,
                gate: None,
                payloads: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }),
            fields: Arc::new(FixedQueueFields(fields)),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn with_visit_gate(mut self, gate: Gate) -> Self {
        self.visits = Arc::new(FakeVisitClient {
            result: self.visits.result.clone(),
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        });
        self
    }

    pub fn with_queue_gate(mut self, gate: Gate) -> Self {
        self.queue = Arc::new(FakeQueueClient {
            result: self.queue.result.clone(),
            gate: Some(gate),
            payloads: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            visits: self.visits.clone(),
            queue: self.queue.clone(),
            queue_fields: self.fields.clone(),
            notifications: self.sink.clone(),
            cache: self.sink.clone(),
            surface: self.sink.clone(),
        }
    }
}
