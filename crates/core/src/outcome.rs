//! Maps terminal submission states to notifications and side effects.
//!
//! | state                      | notifications                 | refresh | close |
//! |----------------------------|-------------------------------|---------|-------|
//! | Succeeded (no queue)       | visit started                 | yes     | yes   |
//! | Succeeded (queue admitted) | visit started, queue added    | yes     | yes   |
//! | SucceededWithQueueWarning  | visit started, queue error    | yes     | yes   |
//! | Failed                     | start-visit error (blocking)  | no      | no    |
//! | AttributeCheckFailed       | inline missing-attributes     | no      | no    |

use crate::client::{NotificationSink, VisitCache, WorkflowSurface};
use crate::constants::{
    MISSING_ATTRIBUTES_TITLE, QUEUE_ADDED_MESSAGE, QUEUE_ENTRY_ERROR_TITLE,
    START_VISIT_ERROR_TITLE, VISIT_STARTED_TITLE,
};
use crate::orchestrator::SubmissionState;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// How the notification should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    /// Transient, non-blocking.
    Toast,
    /// Persistent until dismissed.
    Banner,
    /// Rendered next to the form fields.
    Inline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub presentation: Presentation,
    pub critical: bool,
    pub title: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SideEffects {
    pub refresh_visits: bool,
    pub close_surface: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub notifications: Vec<Notification>,
    pub effects: SideEffects,
}

pub struct OutcomeDispatcher;

impl OutcomeDispatcher {
    /// Describe the outcome of a terminal state. Non-terminal states and
    /// cancellation produce nothing.
    pub fn describe(state: &SubmissionState) -> Option<Outcome> {
        let success_effects = SideEffects {
            refresh_visits: true,
            close_surface: true,
        };

        match state {
            SubmissionState::Succeeded {
                visit,
                queue_admitted,
            } => {
                let mut notifications = vec![visit_started(visit.visit_type.label())];
                if *queue_admitted {
                    notifications.push(Notification {
                        severity: Severity::Success,
                        presentation: Presentation::Toast,
                        critical: false,
                        title: VISIT_STARTED_TITLE.into(),
                        message: QUEUE_ADDED_MESSAGE.into(),
                    });
                }
                Some(Outcome {
                    notifications,
                    effects: success_effects,
                })
            }
            SubmissionState::SucceededWithQueueWarning { visit, error } => Some(Outcome {
                notifications: vec![
                    visit_started(visit.visit_type.label()),
                    Notification {
                        severity: Severity::Error,
                        presentation: Presentation::Toast,
                        critical: true,
                        title: QUEUE_ENTRY_ERROR_TITLE.into(),
                        message: error.message.clone(),
                    },
                ],
                effects: success_effects,
            }),
            SubmissionState::Failed { error } => Some(Outcome {
                notifications: vec![Notification {
                    severity: Severity::Error,
                    presentation: Presentation::Banner,
                    critical: true,
                    title: START_VISIT_ERROR_TITLE.into(),
                    message: error.message.clone(),
                }],
                effects: SideEffects::default(),
            }),
            SubmissionState::AttributeCheckFailed { missing } => {
                let labels: Vec<&str> = missing.iter().map(|a| a.label()).collect();
                Some(Outcome {
                    notifications: vec![Notification {
                        severity: Severity::Warning,
                        presentation: Presentation::Inline,
                        critical: false,
                        title: MISSING_ATTRIBUTES_TITLE.into(),
                        message: labels.join(", "),
                    }],
                    effects: SideEffects::default(),
                })
            }
            _ => None,
        }
    }

    /// Carry out an outcome: refresh, close, then notify. Each effect fires once.
    pub fn dispatch(
        outcome: &Outcome,
        patient_uuid: &str,
        notifications: &dyn NotificationSink,
        cache: &dyn VisitCache,
        surface: &dyn WorkflowSurface,
    ) {
        if outcome.effects.refresh_visits {
            cache.invalidate(patient_uuid);
        }
        if outcome.effects.close_surface {
            surface.close();
        }
        for notification in &outcome.notifications {
            tracing::debug!(
                severity = ?notification.severity,
                title = %notification.title,
                "dispatching notification"
            );
            notifications.notify(notification);
        }
    }
}

fn visit_started(visit_type_label: &str) -> Notification {
    Notification {
        severity: Severity::Success,
        presentation: Presentation::Toast,
        critical: true,
        title: VISIT_STARTED_TITLE.into(),
        message: format!("{visit_type_label} started successfully"),
    }
}
