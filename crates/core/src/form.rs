//! Visit form state and its declarative schema.
//!
//! Responsibilities:
//! - Hold the in-progress user input (`VisitFormState`)
//! - Compute the defaults the form opens with
//! - Apply field-level edits (`FieldChange`)
//! - Validate the whole form after every edit and produce field-scoped errors
//! - Produce a strongly typed `ValidatedVisitForm` once everything passes
//!
//! Notes:
//! - A failing field never prevents other fields from being edited
//! - Required attributes are NOT checked here, see `attributes`

use crate::catalog::VisitType;
use crate::clock::{combine_start_datetime, ClockTime};
use crate::config::WorkflowConfig;
use crate::constants::{ALL_TAB_INDEX, RECOMMENDED_TAB_INDEX};
use crate::VisitResult;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use visit_types::{NonEmptyText, ResourceRef, TimeFormat};

/// An active program enrollment the visit can be recorded against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEnrollment {
    pub uuid: String,
    pub display: String,
    pub program: ResourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_enrolled: Option<NaiveDate>,
}

/// In-progress user input. Lives only as long as the form surface is open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitFormState {
    pub visit_date: NaiveDate,
    pub visit_time: String,
    pub time_format: TimeFormat,
    pub selected_location: String,
    pub visit_type: String,
    #[serde(default)]
    pub enrollment: Option<ProgramEnrollment>,
    pub content_switcher_index: u8,
}

/// What the surface knows when it opens.
#[derive(Clone, Copy, Debug)]
pub struct FormContext<'a> {
    pub now: NaiveDateTime,
    pub session_location: Option<&'a str>,
    pub locations_available: bool,
    pub visit_types: &'a [VisitType],
    pub active_enrollments: &'a [ProgramEnrollment],
}

impl VisitFormState {
    /// Build the state the form opens with.
    ///
    /// - date/time: `ctx.now`, shown on the 12-hour clock
    /// - location: the session location, if any
    /// - enrollment: the first active enrollment
    /// - content switcher: recommended tab when enabled, otherwise all
    /// - visit type: pre-selected only when locations are available, a session
    ///   location exists, and exactly one visit type is configured
    pub fn with_defaults(config: &WorkflowConfig, ctx: &FormContext<'_>) -> Self {
        let (clock, time_format) = ClockTime::from_time(ctx.now.time());
        let session_location = ctx
            .session_location
            .map(str::trim)
            .filter(|loc| !loc.is_empty());

        let visit_type = match (ctx.locations_available, session_location, ctx.visit_types) {
            (true, Some(_), [only]) => only.uuid.clone(),
            _ => String::new(),
        };

        Self {
            visit_date: ctx.now.date(),
            visit_time: clock.to_string(),
            time_format,
            selected_location: session_location.unwrap_or_default().to_owned(),
            visit_type,
            enrollment: ctx.active_enrollments.first().cloned(),
            content_switcher_index: if config.show_recommended_visit_type_tab() {
                RECOMMENDED_TAB_INDEX
            } else {
                ALL_TAB_INDEX
            },
        }
    }

    /// Apply a single field edit.
    ///
    /// Program selection looks the enrollment up by program uuid among
    /// `active_enrollments`; an unknown program clears the selection.
    pub fn apply(&mut self, change: FieldChange, active_enrollments: &[ProgramEnrollment]) {
        match change {
            FieldChange::VisitDate(date) => self.visit_date = date,
            FieldChange::VisitTime(time) => self.visit_time = time,
            FieldChange::TimeFormat(format) => self.time_format = format,
            FieldChange::SelectedLocation(location) => self.selected_location = location,
            FieldChange::VisitType(visit_type) => self.visit_type = visit_type,
            FieldChange::Program(program_uuid) => {
                self.enrollment = program_uuid.and_then(|uuid| {
                    active_enrollments
                        .iter()
                        .find(|e| e.program.uuid == uuid)
                        .cloned()
                });
            }
            FieldChange::ContentSwitcherIndex(index) => self.content_switcher_index = index,
        }
    }
}

/// A single user edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldChange {
    VisitDate(NaiveDate),
    VisitTime(String),
    TimeFormat(TimeFormat),
    SelectedLocation(String),
    VisitType(String),
    /// Program uuid chosen in the program radio group, `None` to clear.
    Program(Option<String>),
    ContentSwitcherIndex(u8),
}

impl FieldChange {
    pub fn field(&self) -> FormField {
        match self {
            Self::VisitDate(_) => FormField::VisitDate,
            Self::VisitTime(_) => FormField::VisitTime,
            Self::TimeFormat(_) => FormField::TimeFormat,
            Self::SelectedLocation(_) => FormField::SelectedLocation,
            Self::VisitType(_) => FormField::VisitType,
            Self::Program(_) => FormField::Enrollment,
            Self::ContentSwitcherIndex(_) => FormField::ContentSwitcherIndex,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    VisitDate,
    VisitTime,
    TimeFormat,
    SelectedLocation,
    VisitType,
    Enrollment,
    ContentSwitcherIndex,
}

/// Field-scoped validation messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<FormField, String>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    fn insert(&mut self, field: FormField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }
}

/// Form state that passed every schema rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedVisitForm {
    pub visit_date: NaiveDate,
    pub visit_time: ClockTime,
    pub time_format: TimeFormat,
    pub location: NonEmptyText,
    pub visit_type: NonEmptyText,
    pub enrollment: Option<ProgramEnrollment>,
}

impl ValidatedVisitForm {
    pub fn start_datetime(&self) -> VisitResult<NaiveDateTime> {
        combine_start_datetime(self.visit_date, self.visit_time, self.time_format)
    }
}

/// Validity rules for every field of [`VisitFormState`].
pub struct VisitFormSchema;

impl VisitFormSchema {
    /// Run every rule. An empty result means the form is schema-valid.
    pub fn validate(state: &VisitFormState, today: NaiveDate) -> FormErrors {
        match Self::validated(state, today) {
            Ok(_) => FormErrors::default(),
            Err(errors) => errors,
        }
    }

    /// Run every rule and, if all pass, return the typed form.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once, not just the first.
    pub fn validated(
        state: &VisitFormState,
        today: NaiveDate,
    ) -> Result<ValidatedVisitForm, FormErrors> {
        let mut errors = FormErrors::default();

        if state.visit_date > today {
            errors.insert(FormField::VisitDate, "Visit date cannot be in the future");
        }

        let visit_time = ClockTime::parse(&state.visit_time)
            .map_err(|_| errors.insert(FormField::VisitTime, "Enter a time as hh:mm"))
            .ok();

        let location = NonEmptyText::new(&state.selected_location)
            .map_err(|_| errors.insert(FormField::SelectedLocation, "Required"))
            .ok();

        let visit_type = NonEmptyText::new(&state.visit_type)
            .map_err(|_| errors.insert(FormField::VisitType, "Please select a Visit Type"))
            .ok();

        if ![RECOMMENDED_TAB_INDEX, ALL_TAB_INDEX].contains(&state.content_switcher_index) {
            errors.insert(
                FormField::ContentSwitcherIndex,
                format!("Unknown visit type tab {}", state.content_switcher_index),
            );
        }

        match (visit_time, location, visit_type) {
            (Some(visit_time), Some(location), Some(visit_type)) if errors.is_empty() => {
                Ok(ValidatedVisitForm {
                    visit_date: state.visit_date,
                    visit_time,
                    time_format: state.time_format,
                    location,
                    visit_type,
                    enrollment: state.enrollment.clone(),
                })
            }
            _ => Err(errors),
        }
    }
}
