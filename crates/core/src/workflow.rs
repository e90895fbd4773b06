//! Per-surface visit workflow.
//!
//! Responsibilities:
//! - Own the form state, collected attribute values, and visit-type catalog for
//!   one open workflow surface
//! - Translate surface events into form edits and state-machine inputs
//! - Revalidate the whole form after every edit so the submit control always
//!   reflects current validity
//! - Track partial resource-load failures and unsaved changes
//! - Run submissions through the async driver
//!
//! Notes:
//! - One instance per open surface; instances never share mutable state
//! - Closing the surface goes through [`VisitWorkflow::discard`], or through the
//!   handle from [`VisitWorkflow::cancel_handle`] while a submit is being awaited

use crate::attributes::{AttributeCatalog, VisitAttributeType, VisitAttributeValues};
use crate::cancel::CancellationHandle;
use crate::catalog::{Page, VisitType, VisitTypeCatalog, VisitTypeTab};
use crate::client::Collaborators;
use crate::config::WorkflowConfig;
use crate::constants::{PARTIAL_LOAD_MESSAGE, PARTIAL_LOAD_TITLE};
use crate::error::SubmitRejected;
use crate::form::{
    FieldChange, FormContext, FormErrors, ProgramEnrollment, VisitFormSchema, VisitFormState,
};
use crate::orchestrator::{SubmissionMachine, SubmissionState};
use crate::outcome::{Notification, Presentation, Severity};
use crate::submitter::{drive, SubmissionReport};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use visit_types::{NonEmptyText, ResourceRef};

/// What the surface knows when it opens.
#[derive(Clone, Debug)]
pub struct WorkflowContext {
    pub patient_uuid: NonEmptyText,
    pub now: NaiveDateTime,
    pub session_location: Option<String>,
    pub locations: Vec<ResourceRef>,
    pub visit_types: Vec<VisitType>,
    pub active_enrollments: Vec<ProgramEnrollment>,
}

/// Something that happened on the surface or in a collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowEvent {
    FieldChanged(FieldChange),
    AttributeValueChanged {
        attribute_type: String,
        value: String,
    },
    AttributeTypesLoaded(Vec<VisitAttributeType>),
    RecommendedVisitTypesLoaded(Vec<VisitType>),
    /// A collaborator could not load part of the form.
    ResourceLoadFailed {
        resource: String,
        block_saving: bool,
    },
}

/// What the host must do after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventEffect {
    None,
    /// A deferred submit is ready to go; call [`VisitWorkflow::submit`] again.
    ResumeSubmission,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LoadFailure {
    resource: String,
    block_saving: bool,
}

pub struct VisitWorkflow {
    cfg: Arc<WorkflowConfig>,
    patient_uuid: NonEmptyText,
    today: NaiveDate,
    form: VisitFormState,
    errors: FormErrors,
    attribute_catalog: AttributeCatalog,
    attribute_values: VisitAttributeValues,
    visit_types: VisitTypeCatalog,
    active_enrollments: Vec<ProgramEnrollment>,
    load_failures: Vec<LoadFailure>,
    machine: SubmissionMachine,
    cancel: CancellationHandle,
    dirty: bool,
}

impl VisitWorkflow {
    /// Open a workflow with default form values.
    ///
    /// Attribute types start out loading unless the configuration lists none.
    pub fn new(cfg: Arc<WorkflowConfig>, ctx: WorkflowContext) -> Self {
        let form = VisitFormState::with_defaults(
            &cfg,
            &FormContext {
                now: ctx.now,
                session_location: ctx.session_location.as_deref(),
                locations_available: !ctx.locations.is_empty(),
                visit_types: &ctx.visit_types,
                active_enrollments: &ctx.active_enrollments,
            },
        );
        let today = ctx.now.date();
        let errors = VisitFormSchema::validate(&form, today);

        let attribute_catalog = if cfg.visit_attribute_types().is_empty() {
            AttributeCatalog::Ready(Vec::new())
        } else {
            AttributeCatalog::Loading
        };

        tracing::debug!(
            patient = %ctx.patient_uuid,
            visit_types = ctx.visit_types.len(),
            invalid_fields = errors.len(),
            "visit workflow opened"
        );

        Self {
            machine: SubmissionMachine::new(Arc::clone(&cfg), ctx.patient_uuid.clone()),
            cfg,
            patient_uuid: ctx.patient_uuid,
            today,
            form,
            errors,
            attribute_catalog,
            attribute_values: VisitAttributeValues::new(),
            visit_types: VisitTypeCatalog::new(ctx.visit_types),
            active_enrollments: ctx.active_enrollments,
            load_failures: Vec::new(),
            cancel: CancellationHandle::new(),
            dirty: false,
        }
    }

    pub fn form(&self) -> &VisitFormState {
        &self.form
    }

    /// Field-scoped errors from the latest validation run.
    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn attribute_values(&self) -> &VisitAttributeValues {
        &self.attribute_values
    }

    pub fn attribute_catalog(&self) -> &AttributeCatalog {
        &self.attribute_catalog
    }

    pub fn state(&self) -> &SubmissionState {
        self.machine.state()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Handle to close the surface from outside, e.g. while [`Self::submit`] is awaited.
    pub fn cancel_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Apply one event.
    pub fn handle(&mut self, event: WorkflowEvent) -> EventEffect {
        match event {
            WorkflowEvent::FieldChanged(change) => {
                if matches!(
                    change,
                    FieldChange::Program(_) | FieldChange::SelectedLocation(_)
                ) {
                    // Recommendations depend on enrollment and location.
                    self.visit_types.reset_recommended();
                }
                self.form.apply(change, &self.active_enrollments);
                self.edited();
            }
            WorkflowEvent::AttributeValueChanged {
                attribute_type,
                value,
            } => {
                self.attribute_values.set(attribute_type, value);
                self.edited();
            }
            WorkflowEvent::AttributeTypesLoaded(types) => {
                tracing::debug!(count = types.len(), "visit attribute types loaded");
                self.attribute_catalog =
                    AttributeCatalog::resolved(self.cfg.visit_attribute_types(), types);
                if self.machine.attribute_types_loaded() {
                    return EventEffect::ResumeSubmission;
                }
            }
            WorkflowEvent::RecommendedVisitTypesLoaded(types) => {
                self.visit_types.set_recommended(types);
            }
            WorkflowEvent::ResourceLoadFailed {
                resource,
                block_saving,
            } => {
                tracing::warn!(%resource, block_saving, "part of the visit form failed to load");
                self.load_failures.push(LoadFailure {
                    resource,
                    block_saving,
                });
            }
        }
        EventEffect::None
    }

    fn edited(&mut self) {
        self.dirty = true;
        self.errors = VisitFormSchema::validate(&self.form, self.today);
        self.machine.form_edited();
    }

    fn saving_blocked(&self) -> bool {
        self.load_failures.iter().any(|f| f.block_saving)
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        self.errors.is_empty()
            && !self.saving_blocked()
            && !self.cancel.is_cancelled()
            && self.machine.accepts_submit()
    }

    /// Banner describing partial load failures, if any.
    pub fn banner(&self) -> Option<Notification> {
        if self.load_failures.is_empty() {
            return None;
        }
        let blocking = self.saving_blocked();
        Some(Notification {
            severity: if blocking {
                Severity::Error
            } else {
                Severity::Warning
            },
            presentation: Presentation::Banner,
            critical: blocking,
            title: PARTIAL_LOAD_TITLE.into(),
            message: PARTIAL_LOAD_MESSAGE.into(),
        })
    }

    /// Resources that failed to load, in the order they were reported.
    pub fn failed_resources(&self) -> impl Iterator<Item = &str> {
        self.load_failures.iter().map(|f| f.resource.as_str())
    }

    /// Which visit-type list the content switcher currently shows.
    pub fn visit_type_tab(&self) -> VisitTypeTab {
        VisitTypeTab::from_index(
            self.form.content_switcher_index,
            self.cfg.show_recommended_visit_type_tab(),
        )
    }

    /// Search the visible visit-type list. `None` while recommendations load.
    pub fn visit_type_page(&self, query: &str, page: usize) -> Option<Page<VisitType>> {
        self.visit_types.search(
            self.visit_type_tab(),
            query,
            self.cfg.visit_types_page_size(),
            page,
        )
    }

    /// Submit the form, validating the visit date against `today`.
    ///
    /// Remote failures never surface here; they end up in the report's state.
    /// A submit made while attribute types are loading comes back in
    /// `AwaitingAttributeTypes`; the host resubmits on
    /// [`EventEffect::ResumeSubmission`].
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejected`] without touching the network if the form is
    /// invalid, saving is blocked, the surface is closed, or an attempt is in flight.
    pub async fn submit(
        &mut self,
        collaborators: &Collaborators,
        today: NaiveDate,
    ) -> Result<SubmissionReport, SubmitRejected> {
        if self.cancel.is_cancelled() {
            return Err(SubmitRejected::Closed);
        }
        if self.saving_blocked() {
            return Err(SubmitRejected::SavingBlocked);
        }
        if today != self.today {
            self.today = today;
            self.errors = VisitFormSchema::validate(&self.form, today);
        }

        let form = VisitFormSchema::validated(&self.form, self.today).map_err(|errors| {
            tracing::debug!(invalid_fields = errors.len(), "visit submit refused by schema");
            self.errors = errors.clone();
            SubmitRejected::FormInvalid(errors)
        })?;

        let step = self
            .machine
            .submit(&form, &self.attribute_catalog, &self.attribute_values)?;
        let report = drive(
            &mut self.machine,
            step,
            collaborators,
            self.cancel.signal(),
            self.patient_uuid.as_str(),
        )
        .await;

        if report.state.is_success() {
            self.dirty = false;
        }
        Ok(report)
    }

    /// Whether closing now would lose unsaved edits.
    pub fn prompt_before_closing(&self) -> bool {
        self.dirty && !self.machine.state().is_success()
    }

    /// Close the surface, cancelling anything pending.
    pub fn discard(&mut self) {
        self.cancel.cancel();
        if self.machine.cancel() {
            tracing::info!(patient = %self.patient_uuid, "visit workflow discarded with pending work");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RemoteError;
    use crate::config::ConfiguredAttributeType;
    use crate::form::FormField;
    use crate::testing::*;
    use chrono::NaiveDate;
    use std::sync::atomic::Ordering;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn today() -> NaiveDate {
        now().date()
    }

    fn enrollment(uuid: &str, program: &str) -> ProgramEnrollment {
        ProgramEnrollment {
            uuid: uuid.into(),
            display: format!("enrollment {uuid}"),
            program: ResourceRef::new(program, "HIV Care"),
            location: None,
            date_enrolled: None,
        }
    }

    fn context(visit_types: Vec<VisitType>) -> WorkflowContext {
        WorkflowContext {
            patient_uuid: NonEmptyText::new("patient-1").unwrap(),
            now: now(),
            session_location: Some("loc-1".into()),
            locations: vec![ResourceRef::new("loc-1", "Outpatient Clinic")],
            visit_types,
            active_enrollments: vec![enrollment("e1", "p1"), enrollment("e2", "p2")],
        }
    }

    fn single_type() -> Vec<VisitType> {
        vec![VisitType::new("vt-1", "Outpatient Visit")]
    }

    fn config(recommended: bool, queue: bool, attributes: Vec<ConfiguredAttributeType>) -> Arc<WorkflowConfig> {
        Arc::new(WorkflowConfig::new(recommended, queue, attributes, None, 2).unwrap())
    }

    fn workflow() -> VisitWorkflow {
        VisitWorkflow::new(config(false, false, vec![]), context(single_type()))
    }

    fn success_harness() -> Harness {
        Harness::new(Ok(created_visit("V1")), Ok(receipt(201)), None)
    }

    #[test]
    fn opens_with_defaults_and_is_submittable() {
        let wf = workflow();

        assert_eq!(wf.form().visit_time, "02:30");
        assert_eq!(wf.form().selected_location, "loc-1");
        assert_eq!(wf.form().visit_type, "vt-1");
        assert_eq!(wf.form().enrollment.as_ref().map(|e| e.uuid.as_str()), Some("e1"));
        assert!(wf.errors().is_empty());
        assert!(wf.can_submit());
        assert!(!wf.is_dirty());
        assert!(!wf.prompt_before_closing());
    }

    #[test]
    fn every_edit_revalidates_and_marks_dirty() {
        let mut wf = workflow();

        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitType(String::new())));
        assert_eq!(wf.errors().get(FormField::VisitType), Some("Please select a Visit Type"));
        assert!(!wf.can_submit());
        assert!(wf.prompt_before_closing());

        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitType("vt-1".into())));
        assert!(wf.errors().is_empty());
        assert!(wf.can_submit());
    }

    #[test]
    fn program_change_selects_matching_enrollment() {
        let mut wf = workflow();

        wf.handle(WorkflowEvent::FieldChanged(FieldChange::Program(Some("p2".into()))));
        assert_eq!(wf.form().enrollment.as_ref().map(|e| e.uuid.as_str()), Some("e2"));

        wf.handle(WorkflowEvent::FieldChanged(FieldChange::Program(Some("missing".into()))));
        assert!(wf.form().enrollment.is_none());
    }

    #[test]
    fn recommended_tab_waits_for_recommendations() {
        let types = vec![
            VisitType::new("vt-1", "Outpatient Visit"),
            VisitType::new("vt-2", "HIV Return Visit"),
            VisitType::new("vt-3", "HIV Initial Visit"),
        ];
        let mut wf = VisitWorkflow::new(config(true, false, vec![]), context(types));
        assert_eq!(wf.visit_type_tab(), VisitTypeTab::Recommended);
        assert!(wf.visit_type_page("", 1).is_none());

        wf.handle(WorkflowEvent::RecommendedVisitTypesLoaded(vec![VisitType::new(
            "vt-2",
            "HIV Return Visit",
        )]));
        let page = wf.visit_type_page("hiv", 1).expect("recommendations loaded");
        assert_eq!(page.results.len(), 1);

        wf.handle(WorkflowEvent::FieldChanged(FieldChange::ContentSwitcherIndex(1)));
        let page = wf.visit_type_page("hiv", 9).expect("all types are always ready");
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.results.len(), 2);

        wf.handle(WorkflowEvent::FieldChanged(FieldChange::ContentSwitcherIndex(0)));
        wf.handle(WorkflowEvent::FieldChanged(FieldChange::SelectedLocation("loc-2".into())));
        assert!(wf.visit_type_page("", 1).is_none());
    }

    #[test]
    fn load_failures_raise_banner_and_may_block_saving() {
        let mut wf = workflow();
        assert!(wf.banner().is_none());

        wf.handle(WorkflowEvent::ResourceLoadFailed {
            resource: "visit attribute types".into(),
            block_saving: false,
        });
        let banner = wf.banner().expect("banner");
        assert_eq!(banner.severity, Severity::Warning);
        assert!(wf.can_submit());

        wf.handle(WorkflowEvent::ResourceLoadFailed {
            resource: "locations".into(),
            block_saving: true,
        });
        assert_eq!(wf.banner().expect("banner").severity, Severity::Error);
        assert!(!wf.can_submit());
        assert_eq!(
            wf.failed_resources().collect::<Vec<_>>(),
            vec!["visit attribute types", "locations"]
        );
    }

    #[tokio::test]
    async fn blocked_saving_rejects_submit_without_remote_call() {
        let harness = success_harness();
        let mut wf = workflow();
        wf.handle(WorkflowEvent::ResourceLoadFailed {
            resource: "locations".into(),
            block_saving: true,
        });

        let err = wf.submit(&harness.collaborators(), today()).await.unwrap_err();
        assert_eq!(err, SubmitRejected::SavingBlocked);
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn schema_invalid_form_never_calls_remote() {
        let harness = success_harness();
        let mut wf = workflow();
        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitDate(
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
        )));
        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitTime("13:00".into())));

        match wf.submit(&harness.collaborators(), today()).await {
            Err(SubmitRejected::FormInvalid(errors)) => {
                assert!(errors.get(FormField::VisitDate).is_some());
                assert!(errors.get(FormField::VisitTime).is_some());
            }
            other => panic!("expected FormInvalid, got {other:?}"),
        }
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 0);
        assert_eq!(wf.state(), &SubmissionState::Idle);
    }

    #[tokio::test]
    async fn missing_attribute_blocks_until_value_is_entered() {
        let harness = success_harness();
        let cfg = config(
            false,
            false,
            vec![ConfiguredAttributeType {
                uuid: "a1".into(),
                required: true,
            }],
        );
        let mut wf = VisitWorkflow::new(cfg, context(single_type()));
        wf.handle(WorkflowEvent::AttributeTypesLoaded(vec![VisitAttributeType {
            uuid: "a1".into(),
            required: true,
            display: Some("Payment method".into()),
        }]));

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert!(matches!(report.state, SubmissionState::AttributeCheckFailed { .. }));
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.sink.severities(), vec![Severity::Warning]);

        wf.handle(WorkflowEvent::AttributeValueChanged {
            attribute_type: "a1".into(),
            value: "cash".into(),
        });
        assert_eq!(wf.state(), &SubmissionState::Idle);

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert!(report.state.is_success());
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn configured_required_attribute_wins_over_loaded_flag() {
        let harness = success_harness();
        let cfg = config(
            false,
            false,
            vec![
                ConfiguredAttributeType {
                    uuid: "a1".into(),
                    required: true,
                },
                ConfiguredAttributeType {
                    uuid: "a2".into(),
                    required: true,
                },
            ],
        );
        let mut wf = VisitWorkflow::new(cfg, context(single_type()));
        wf.handle(WorkflowEvent::AttributeTypesLoaded(vec![VisitAttributeType {
            uuid: "a1".into(),
            required: false,
            display: Some("Payment method".into()),
        }]));

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        match report.state {
            SubmissionState::AttributeCheckFailed { missing } => {
                let uuids: Vec<&str> = missing.iter().map(|a| a.uuid.as_str()).collect();
                assert_eq!(uuids, vec!["a1", "a2"]);
            }
            other => panic!("expected AttributeCheckFailed, got {other:?}"),
        }
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_validates_against_the_current_day() {
        let harness = success_harness();
        let mut wf = workflow();
        let tomorrow = today().succ_opt().unwrap();
        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitDate(tomorrow)));
        assert!(!wf.can_submit());

        let report = wf.submit(&harness.collaborators(), tomorrow).await.expect("accepted");
        assert!(report.state.is_success());
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_while_attribute_types_load_is_deferred() {
        let harness = success_harness();
        let cfg = config(
            false,
            false,
            vec![ConfiguredAttributeType {
                uuid: "a1".into(),
                required: false,
            }],
        );
        let mut wf = VisitWorkflow::new(cfg, context(single_type()));
        assert!(wf.attribute_catalog().is_loading());

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert_eq!(report.state, SubmissionState::AwaitingAttributeTypes);
        assert!(report.outcome.is_none());
        assert!(!wf.can_submit());
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 0);

        let effect = wf.handle(WorkflowEvent::AttributeTypesLoaded(vec![VisitAttributeType {
            uuid: "a1".into(),
            required: false,
            display: None,
        }]));
        assert_eq!(effect, EventEffect::ResumeSubmission);

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert!(matches!(report.state, SubmissionState::Succeeded { .. }));
    }

    #[tokio::test]
    async fn success_closes_the_workflow_for_further_submits() {
        let harness = success_harness();
        let mut wf = workflow();
        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitTime("2:30".into())));

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert!(report.state.is_success());
        assert!(!wf.is_dirty());
        assert!(!wf.can_submit());
        assert_eq!(harness.sink.closes.load(Ordering::SeqCst), 1);

        let err = wf.submit(&harness.collaborators(), today()).await.unwrap_err();
        assert_eq!(err, SubmitRejected::Closed);
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_allows_explicit_resubmit() {
        let harness = Harness::new(
            Err(RemoteError::with_status(500, "server error")),
            Ok(receipt(201)),
            None,
        );
        let mut wf = workflow();

        let report = wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert!(matches!(report.state, SubmissionState::Failed { .. }));
        assert!(wf.can_submit());

        wf.submit(&harness.collaborators(), today()).await.expect("accepted");
        assert_eq!(harness.visits.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancel_handle_stops_pending_submit_before_queue() {
        let gate = Gate::default();
        let harness = Harness::new(
            Ok(created_visit("V1")),
            Ok(receipt(201)),
            Some(sample_queue_fields()),
        )
        .with_visit_gate(gate.clone());
        let mut wf = VisitWorkflow::new(config(false, true, vec![]), context(single_type()));
        let handle = wf.cancel_handle();
        let collaborators = harness.collaborators();

        let close = async {
            gate.started.notified().await;
            handle.cancel();
            gate.release.notify_one();
        };
        let (report, ()) = tokio::join!(wf.submit(&collaborators, today()), close);

        assert_eq!(report.expect("accepted").state, SubmissionState::Cancelled);
        assert_eq!(harness.queue.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.sink.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(
            wf.submit(&collaborators, today()).await.unwrap_err(),
            SubmitRejected::Closed
        );
    }

    #[test]
    fn discard_closes_the_workflow() {
        let mut wf = workflow();
        wf.handle(WorkflowEvent::FieldChanged(FieldChange::VisitTime("3:00".into())));
        assert!(wf.prompt_before_closing());

        wf.discard();
        assert!(!wf.can_submit());
        assert!(wf.cancel_handle().is_cancelled());
    }
}
