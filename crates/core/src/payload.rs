//! Outbound request payloads.
//!
//! Both payloads are built once per attempt and never mutated afterwards. The
//! queue-admission payload can only be built from a created visit, so it cannot
//! exist before the visit-creation call has succeeded.

use crate::attributes::VisitAttributeValues;
use crate::client::CreatedVisit;
use crate::constants::START_DATETIME_FORMAT;
use crate::form::ValidatedVisitForm;
use crate::{VisitError, VisitResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use visit_types::NonEmptyText;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitAttributePayload {
    pub attribute_type: String,
    pub value: String,
}

/// The "start visit" request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitCreationPayload {
    patient: String,
    #[serde(serialize_with = "serialize_start_datetime")]
    start_datetime: NaiveDateTime,
    visit_type: String,
    location: String,
    attributes: Vec<VisitAttributePayload>,
}

fn serialize_start_datetime<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&value.format(START_DATETIME_FORMAT))
}

impl VisitCreationPayload {
    /// Assemble the request from a validated form and the collected attribute values.
    ///
    /// Attribute entries with an empty value are left out.
    pub fn build(
        patient_uuid: &NonEmptyText,
        form: &ValidatedVisitForm,
        attributes: &VisitAttributeValues,
    ) -> VisitResult<Self> {
        Ok(Self {
            patient: patient_uuid.to_string(),
            start_datetime: form.start_datetime()?,
            visit_type: form.visit_type.to_string(),
            location: form.location.to_string(),
            attributes: attributes.to_payload(),
        })
    }

    pub fn patient(&self) -> &str {
        &self.patient
    }

    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start_datetime
    }

    pub fn visit_type(&self) -> &str {
        &self.visit_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn attributes(&self) -> &[VisitAttributePayload] {
        &self.attributes
    }

    pub fn to_json(&self) -> VisitResult<serde_json::Value> {
        serde_json::to_value(self).map_err(VisitError::Serialization)
    }
}

// ============================================================================
// QUEUE ADMISSION
// ============================================================================

/// Queue inputs read from the sibling queue-fields surface.
///
/// These are not validated by this crate; they are forwarded as entered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueFields {
    pub service: String,
    pub priority: String,
    pub status: String,
    #[serde(default)]
    pub sort_weight: f64,
    #[serde(default)]
    pub queue_location: Option<String>,
}

/// The dependent "admit to queue" request, referencing a created visit.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueAdmissionPayload {
    visit_uuid: String,
    patient_uuid: String,
    fields: QueueFields,
    visit_queue_number_attribute_uuid: Option<String>,
}

impl QueueAdmissionPayload {
    pub fn build(
        visit: &CreatedVisit,
        patient_uuid: &NonEmptyText,
        fields: QueueFields,
        visit_queue_number_attribute_uuid: Option<&str>,
    ) -> Self {
        Self {
            visit_uuid: visit.uuid.clone(),
            patient_uuid: patient_uuid.to_string(),
            fields,
            visit_queue_number_attribute_uuid: visit_queue_number_attribute_uuid
                .map(str::to_owned),
        }
    }

    pub fn visit_uuid(&self) -> &str {
        &self.visit_uuid
    }

    pub fn patient_uuid(&self) -> &str {
        &self.patient_uuid
    }

    pub fn fields(&self) -> &QueueFields {
        &self.fields
    }

    pub fn visit_queue_number_attribute_uuid(&self) -> Option<&str> {
        self.visit_queue_number_attribute_uuid.as_deref()
    }

    pub fn to_json(&self) -> VisitResult<serde_json::Value> {
        serde_json::to_value(self.to_wire()).map_err(VisitError::Serialization)
    }

    fn to_wire(&self) -> QueueAdmissionWire<'_> {
        QueueAdmissionWire {
            visit: UuidRef {
                uuid: &self.visit_uuid,
            },
            queue_entry: QueueEntryWire {
                status: UuidRef {
                    uuid: &self.fields.status,
                },
                priority: UuidRef {
                    uuid: &self.fields.priority,
                },
                queue: UuidRef {
                    uuid: &self.fields.service,
                },
                patient: UuidRef {
                    uuid: &self.patient_uuid,
                },
                sort_weight: self.fields.sort_weight,
            },
            location_uuid: self.fields.queue_location.as_deref(),
            visit_queue_number_attribute_uuid: self.visit_queue_number_attribute_uuid.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct UuidRef<'a> {
    uuid: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueAdmissionWire<'a> {
    visit: UuidRef<'a>,
    queue_entry: QueueEntryWire<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visit_queue_number_attribute_uuid: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueEntryWire<'a> {
    status: UuidRef<'a>,
    priority: UuidRef<'a>,
    queue: UuidRef<'a>,
    patient: UuidRef<'a>,
    sort_weight: f64,
}
