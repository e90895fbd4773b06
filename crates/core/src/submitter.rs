//! Async driver for [`SubmissionMachine`].
//!
//! Executes the machine's steps one at a time: the two remote calls are strictly
//! sequential, and each is raced against the surface's cancellation signal.
//! Every remote-call error ends up as a terminal state; nothing propagates out.
//! Closing the surface after the visit was created still refreshes the visit
//! list and reports the started visit, but does not close the surface again.

use crate::cancel::{CancelSignal, CancellationHandle};
use crate::client::Collaborators;
use crate::orchestrator::{Step, SubmissionMachine, SubmissionState};
use crate::outcome::{Outcome, OutcomeDispatcher};
use std::sync::Arc;

/// Where an attempt ended up.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionReport {
    pub state: SubmissionState,
    /// The outcome that was dispatched, if the attempt settled.
    pub outcome: Option<Outcome>,
}

/// Run `first` and every step that follows it until the attempt settles,
/// defers, or is cancelled.
pub async fn drive(
    machine: &mut SubmissionMachine,
    first: Step,
    collaborators: &Collaborators,
    mut surface_cancel: CancelSignal,
    patient_uuid: &str,
) -> SubmissionReport {
    let mut step = first;

    loop {
        step = match step {
            Step::CreateVisit { attempt, payload } => {
                tracing::info!(%attempt, visit_type = payload.visit_type(), "creating visit");
                let call = CancellationHandle::new();

                let result = tokio::select! {
                    biased;
                    _ = surface_cancel.cancelled() => None,
                    result = collaborators.visits.create_visit(&payload, call.signal()) => Some(result),
                };

                let Some(result) = result else {
                    call.cancel();
                    machine.cancel();
                    tracing::info!(%attempt, "visit creation cancelled");
                    return cancelled(machine);
                };

                let source = Arc::clone(&collaborators.queue_fields);
                machine.visit_creation_finished(attempt, result, move || source.queue_fields())
            }
            Step::AdmitToQueue { attempt, payload } => {
                tracing::info!(%attempt, visit = payload.visit_uuid(), "admitting visit to queue");
                let call = CancellationHandle::new();

                let result = tokio::select! {
                    biased;
                    _ = surface_cancel.cancelled() => None,
                    result = collaborators.queue.admit_to_queue(&payload, call.signal()) => Some(result),
                };

                let Some(result) = result else {
                    call.cancel();
                    machine.cancel();
                    tracing::info!(%attempt, "queue admission cancelled");
                    return settle(machine.state().clone(), collaborators, patient_uuid, false);
                };

                machine.queue_admission_finished(attempt, result)
            }
            Step::Settled(state) => return settle(state, collaborators, patient_uuid, true),
            Step::Deferred | Step::Ignored => {
                return SubmissionReport {
                    state: machine.state().clone(),
                    outcome: None,
                };
            }
        };
    }
}

fn settle(
    state: SubmissionState,
    collaborators: &Collaborators,
    patient_uuid: &str,
    surface_open: bool,
) -> SubmissionReport {
    let mut outcome = OutcomeDispatcher::describe(&state);
    if let Some(outcome) = &mut outcome {
        outcome.effects.close_surface &= surface_open;
        OutcomeDispatcher::dispatch(
            outcome,
            patient_uuid,
            collaborators.notifications.as_ref(),
            collaborators.cache.as_ref(),
            collaborators.surface.as_ref(),
        );
    }
    SubmissionReport { state, outcome }
}

fn cancelled(machine: &SubmissionMachine) -> SubmissionReport {
    SubmissionReport {
        state: machine.state().clone(),
        outcome: None,
    }
}
