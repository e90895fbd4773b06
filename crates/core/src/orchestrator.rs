//! Visit submission state machine.
//!
//! The machine is sans-IO: it never awaits anything. Each input returns a
//! [`Step`] telling the caller which remote call to issue next, or that the
//! attempt has settled. The async driver in `submitter` executes those steps;
//! hosts with their own event loop can drive the machine directly.
//!
//! ```text
//! Idle ──submit──► Submitting ──ok──► VisitCreated ──queue on──► QueueAdmitting
//!  │                   │                   │                      │        │
//!  │ attrs missing     │ err               │ queue off            │ ok     │ err
//!  ▼                   ▼                   ▼                      ▼        ▼
//! AttributeCheckFailed Failed          Succeeded ◄────────────────┘  SucceededWithQueueWarning
//! ```
//!
//! A queue failure after a created visit is still a success of the visit; it is
//! never rolled back and the visit-creation call is never repeated. Closing the
//! surface during queue admission counts as such a failure.

use crate::attributes::{AttributeCatalog, AttributeCheck, VisitAttributeType, VisitAttributeValues};
use crate::client::{CreatedVisit, QueueAdmissionReceipt, RemoteError};
use crate::config::WorkflowConfig;
use crate::constants::QUEUE_ADMISSION_CANCELLED_MESSAGE;
use crate::error::SubmitRejected;
use crate::form::ValidatedVisitForm;
use crate::payload::{QueueAdmissionPayload, QueueFields, VisitCreationPayload};
use std::sync::Arc;
use uuid::Uuid;
use visit_types::NonEmptyText;

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionState {
    Idle,
    /// Submit was requested while attribute types were still loading.
    AwaitingAttributeTypes,
    AttributeCheckFailed {
        missing: Vec<VisitAttributeType>,
    },
    Submitting {
        attempt: Uuid,
    },
    VisitCreated {
        attempt: Uuid,
        visit: CreatedVisit,
    },
    QueueAdmitting {
        attempt: Uuid,
        visit: CreatedVisit,
    },
    Succeeded {
        visit: CreatedVisit,
        queue_admitted: bool,
    },
    SucceededWithQueueWarning {
        visit: CreatedVisit,
        error: RemoteError,
    },
    Failed {
        error: RemoteError,
    },
    /// The surface was closed before a visit was created.
    Cancelled,
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingAttributeTypes => "awaiting_attribute_types",
            Self::AttributeCheckFailed { .. } => "attribute_check_failed",
            Self::Submitting { .. } => "submitting",
            Self::VisitCreated { .. } => "visit_created",
            Self::QueueAdmitting { .. } => "queue_admitting",
            Self::Succeeded { .. } => "succeeded",
            Self::SucceededWithQueueWarning { .. } => "succeeded_with_queue_warning",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// A remote call is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Submitting { .. } | Self::VisitCreated { .. } | Self::QueueAdmitting { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AttributeCheckFailed { .. }
                | Self::Succeeded { .. }
                | Self::SucceededWithQueueWarning { .. }
                | Self::Failed { .. }
                | Self::Cancelled
        )
    }

    /// The visit exists on the server.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::SucceededWithQueueWarning { .. }
        )
    }
}

/// What the caller must do next.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    CreateVisit {
        attempt: Uuid,
        payload: VisitCreationPayload,
    },
    AdmitToQueue {
        attempt: Uuid,
        payload: QueueAdmissionPayload,
    },
    /// The attempt reached a terminal state; hand it to the outcome dispatcher.
    Settled(SubmissionState),
    /// Waiting for attribute types; resubmit once they load.
    Deferred,
    /// A completion arrived for an attempt that is no longer current.
    Ignored,
}

pub struct SubmissionMachine {
    cfg: Arc<WorkflowConfig>,
    patient_uuid: NonEmptyText,
    state: SubmissionState,
}

impl SubmissionMachine {
    pub fn new(cfg: Arc<WorkflowConfig>, patient_uuid: NonEmptyText) -> Self {
        Self {
            cfg,
            patient_uuid,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Whether the submit control should be enabled.
    pub fn accepts_submit(&self) -> bool {
        matches!(
            self.state,
            SubmissionState::Idle
                | SubmissionState::AttributeCheckFailed { .. }
                | SubmissionState::Failed { .. }
        )
    }

    fn transition(&mut self, next: SubmissionState) {
        tracing::info!(
            from = self.state.name(),
            to = next.name(),
            patient = %self.patient_uuid,
            "visit submission transition"
        );
        self.state = next;
    }

    /// Start an attempt.
    ///
    /// Required attributes are checked first; a missing one settles the attempt
    /// without a remote call.
    ///
    /// # Errors
    ///
    /// - [`SubmitRejected::InFlight`] while a remote call is outstanding
    /// - [`SubmitRejected::Closed`] after success or cancellation
    /// - [`SubmitRejected::InvalidPayload`] if the start timestamp cannot be built
    pub fn submit(
        &mut self,
        form: &ValidatedVisitForm,
        attribute_catalog: &AttributeCatalog,
        attribute_values: &VisitAttributeValues,
    ) -> Result<Step, SubmitRejected> {
        if self.state.is_in_flight() {
            return Err(SubmitRejected::InFlight);
        }
        if self.state.is_success() || self.state == SubmissionState::Cancelled {
            return Err(SubmitRejected::Closed);
        }

        match attribute_catalog.check(attribute_values) {
            AttributeCheck::Loading => {
                self.transition(SubmissionState::AwaitingAttributeTypes);
                Ok(Step::Deferred)
            }
            AttributeCheck::Missing(missing) => {
                tracing::warn!(
                    missing = missing.len(),
                    "visit submission blocked by missing required attributes"
                );
                self.transition(SubmissionState::AttributeCheckFailed { missing });
                Ok(Step::Settled(self.state.clone()))
            }
            AttributeCheck::Satisfied => {
                let payload = VisitCreationPayload::build(&self.patient_uuid, form, attribute_values)
                    .map_err(|e| SubmitRejected::InvalidPayload(e.to_string()))?;
                let attempt = Uuid::new_v4();
                self.transition(SubmissionState::Submitting { attempt });
                Ok(Step::CreateVisit { attempt, payload })
            }
        }
    }

    /// Feed the visit-creation result back in.
    ///
    /// `queue_fields` is only consulted on success with queue admission enabled,
    /// so the sibling surface is read at the moment the visit exists.
    pub fn visit_creation_finished(
        &mut self,
        attempt: Uuid,
        result: Result<CreatedVisit, RemoteError>,
        queue_fields: impl FnOnce() -> Option<QueueFields>,
    ) -> Step {
        if !matches!(self.state, SubmissionState::Submitting { attempt: current } if current == attempt)
        {
            tracing::debug!(%attempt, state = self.state.name(), "ignoring stale visit result");
            return Step::Ignored;
        }

        let visit = match result {
            Ok(visit) => visit,
            Err(error) => {
                tracing::warn!(%attempt, status = ?error.status, "visit creation failed: {error}");
                self.transition(SubmissionState::Failed { error });
                return Step::Settled(self.state.clone());
            }
        };

        self.transition(SubmissionState::VisitCreated {
            attempt,
            visit: visit.clone(),
        });

        if self.cfg.show_service_queue_fields() {
            if let Some(fields) = queue_fields() {
                let payload = QueueAdmissionPayload::build(
                    &visit,
                    &self.patient_uuid,
                    fields,
                    self.cfg.visit_queue_number_attribute_uuid(),
                );
                self.transition(SubmissionState::QueueAdmitting { attempt, visit });
                return Step::AdmitToQueue { attempt, payload };
            }
            tracing::debug!(%attempt, "queue admission enabled but no queue fields exposed");
        }

        self.transition(SubmissionState::Succeeded {
            visit,
            queue_admitted: false,
        });
        Step::Settled(self.state.clone())
    }

    /// Feed the queue-admission result back in.
    pub fn queue_admission_finished(
        &mut self,
        attempt: Uuid,
        result: Result<QueueAdmissionReceipt, RemoteError>,
    ) -> Step {
        let visit = match &self.state {
            SubmissionState::QueueAdmitting {
                attempt: current,
                visit,
            } if *current == attempt => visit.clone(),
            _ => {
                tracing::debug!(%attempt, state = self.state.name(), "ignoring stale queue result");
                return Step::Ignored;
            }
        };

        let next = match result {
            Ok(receipt) if receipt.is_success() => SubmissionState::Succeeded {
                visit,
                queue_admitted: true,
            },
            Ok(receipt) => SubmissionState::SucceededWithQueueWarning {
                visit,
                error: RemoteError::with_status(
                    receipt.status,
                    format!("queue admission returned status {}", receipt.status),
                ),
            },
            Err(error) => SubmissionState::SucceededWithQueueWarning { visit, error },
        };

        if let SubmissionState::SucceededWithQueueWarning { error, .. } = &next {
            tracing::warn!(%attempt, "queue admission failed after visit was created: {error}");
        }
        self.transition(next);
        Step::Settled(self.state.clone())
    }

    /// Abandon pending work. Returns `true` if anything was pending.
    ///
    /// Completions arriving afterwards are ignored, so a cancelled visit-creation
    /// call can never lead to a queue-admission call. Once the visit exists,
    /// cancelling settles as [`SubmissionState::SucceededWithQueueWarning`].
    pub fn cancel(&mut self) -> bool {
        if let SubmissionState::QueueAdmitting { attempt, visit } = &self.state {
            tracing::warn!(
                %attempt,
                visit = %visit.uuid,
                "queue admission abandoned after visit was created"
            );
            let visit = visit.clone();
            self.transition(SubmissionState::SucceededWithQueueWarning {
                visit,
                error: RemoteError::new(QUEUE_ADMISSION_CANCELLED_MESSAGE),
            });
            return true;
        }
        if self.state.is_in_flight() || self.state == SubmissionState::AwaitingAttributeTypes {
            self.transition(SubmissionState::Cancelled);
            return true;
        }
        false
    }

    /// A form field changed.
    pub fn form_edited(&mut self) {
        if matches!(self.state, SubmissionState::AttributeCheckFailed { .. }) {
            self.transition(SubmissionState::Idle);
        }
    }

    /// Attribute types finished loading. Returns `true` if a deferred submit should resume.
    pub fn attribute_types_loaded(&mut self) -> bool {
        if self.state == SubmissionState::AwaitingAttributeTypes {
            self.transition(SubmissionState::Idle);
            return true;
        }
        false
    }
}
