//! Visit workflow configuration.
//!
//! Feature toggles are resolved once, when the workflow surface opens, and then
//! passed into the workflow by `Arc`. Nothing in this crate reads environment
//! variables or other process-wide state while handling events.

use crate::constants::DEFAULT_VISIT_TYPES_PAGE_SIZE;
use crate::{VisitError, VisitResult};
use serde::Deserialize;
use std::collections::HashSet;

/// An attribute type the deployment wants collected on every new visit.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfiguredAttributeType {
    pub uuid: String,
    #[serde(default)]
    pub required: bool,
}

/// Workflow configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    show_recommended_visit_type_tab: bool,
    show_service_queue_fields: bool,
    visit_attribute_types: Vec<ConfiguredAttributeType>,
    visit_queue_number_attribute_uuid: Option<String>,
    visit_types_page_size: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            show_recommended_visit_type_tab: false,
            show_service_queue_fields: false,
            visit_attribute_types: Vec::new(),
            visit_queue_number_attribute_uuid: None,
            visit_types_page_size: DEFAULT_VISIT_TYPES_PAGE_SIZE,
        }
    }
}

impl WorkflowConfig {
    /// Create a new `WorkflowConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`VisitError::InvalidConfig`] if the page size is zero, an attribute
    /// uuid is blank or repeated, or the queue-number attribute uuid is blank.
    pub fn new(
        show_recommended_visit_type_tab: bool,
        show_service_queue_fields: bool,
        visit_attribute_types: Vec<ConfiguredAttributeType>,
        visit_queue_number_attribute_uuid: Option<String>,
        visit_types_page_size: usize,
    ) -> VisitResult<Self> {
        if visit_types_page_size == 0 {
            return Err(VisitError::InvalidConfig(
                "visit_types_page_size must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for attribute in &visit_attribute_types {
            if attribute.uuid.trim().is_empty() {
                return Err(VisitError::InvalidConfig(
                    "visit attribute type uuid cannot be empty".into(),
                ));
            }
            if !seen.insert(attribute.uuid.as_str()) {
                return Err(VisitError::InvalidConfig(format!(
                    "visit attribute type {} is configured more than once",
                    attribute.uuid
                )));
            }
        }

        if visit_queue_number_attribute_uuid
            .as_deref()
            .is_some_and(|uuid| uuid.trim().is_empty())
        {
            return Err(VisitError::InvalidConfig(
                "visit_queue_number_attribute_uuid cannot be blank".into(),
            ));
        }

        Ok(Self {
            show_recommended_visit_type_tab,
            show_service_queue_fields,
            visit_attribute_types,
            visit_queue_number_attribute_uuid,
            visit_types_page_size,
        })
    }

    /// Parse a configuration document from YAML text.
    ///
    /// Unknown keys are rejected, and schema mismatches report the path of the
    /// failing field (e.g. `visit_attribute_types[0].required`).
    ///
    /// # Errors
    ///
    /// Returns [`VisitError::InvalidConfig`] if the YAML does not match the expected
    /// shape or fails the checks performed by [`WorkflowConfig::new`].
    pub fn parse_yaml(yaml_text: &str) -> VisitResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, WorkflowConfigWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(VisitError::InvalidConfig(format!(
                    "configuration schema mismatch at {path}: {source}"
                )));
            }
        };

        Self::new(
            wire.show_recommended_visit_type_tab,
            wire.show_service_queue_fields,
            wire.visit_attribute_types,
            wire.visit_queue_number_attribute_uuid,
            wire.visit_types_page_size,
        )
    }

    /// Apply optional environment-style overrides to the two feature toggles.
    ///
    /// `None` or blank values leave the current setting untouched.
    pub fn with_overrides(
        mut self,
        show_recommended_visit_type_tab: Option<String>,
        show_service_queue_fields: Option<String>,
    ) -> VisitResult<Self> {
        if let Some(value) = bool_from_env_value(show_recommended_visit_type_tab)? {
            self.show_recommended_visit_type_tab = value;
        }
        if let Some(value) = bool_from_env_value(show_service_queue_fields)? {
            self.show_service_queue_fields = value;
        }
        Ok(self)
    }

    pub fn show_recommended_visit_type_tab(&self) -> bool {
        self.show_recommended_visit_type_tab
    }

    pub fn show_service_queue_fields(&self) -> bool {
        self.show_service_queue_fields
    }

    pub fn visit_attribute_types(&self) -> &[ConfiguredAttributeType] {
        &self.visit_attribute_types
    }

    pub fn visit_queue_number_attribute_uuid(&self) -> Option<&str> {
        self.visit_queue_number_attribute_uuid.as_deref()
    }

    pub fn visit_types_page_size(&self) -> usize {
        self.visit_types_page_size
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkflowConfigWire {
    #[serde(default)]
    show_recommended_visit_type_tab: bool,
    #[serde(default)]
    show_service_queue_fields: bool,
    #[serde(default)]
    visit_attribute_types: Vec<ConfiguredAttributeType>,
    #[serde(default)]
    visit_queue_number_attribute_uuid: Option<String>,
    #[serde(default = "default_page_size")]
    visit_types_page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_VISIT_TYPES_PAGE_SIZE
}

/// Parse a boolean toggle from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `Ok(None)`.
pub fn bool_from_env_value(value: Option<String>) -> VisitResult<Option<bool>> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None => Ok(None),
        Some("true" | "1" | "yes" | "on") => Ok(Some(true)),
        Some("false" | "0" | "no" | "off") => Ok(Some(false)),
        Some(other) => Err(VisitError::InvalidConfig(format!(
            "expected a boolean toggle, got {other:?}"
        ))),
    }
}
