//! Operator input files: workflow configuration, visit-type catalogs, and forms.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use visit_core::payload::QueueFields;
use visit_core::{
    AttributeCatalog, VisitAttributeType, VisitAttributeValues, VisitFormState, VisitType,
    WorkflowConfig,
};

/// Load the workflow configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<WorkflowConfig> {
    let Some(path) = path else {
        return Ok(WorkflowConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    WorkflowConfig::parse_yaml(&text)
        .with_context(|| format!("failed to load config {}", path.display()))
}

/// Load a visit-type catalog: a YAML (or JSON) list of `{uuid, display}`.
pub fn load_catalog(path: &Path) -> anyhow::Result<Vec<VisitType>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse catalog {}", path.display()))
}

/// A captured form, as the surface would hold it at submit time.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormFile {
    pub patient_uuid: String,
    pub form: VisitFormState,
    /// Loaded attribute-type definitions, used for labels. Which types are
    /// required always comes from the configuration.
    #[serde(default)]
    pub attribute_types: Vec<VisitAttributeType>,
    #[serde(default)]
    pub attributes: VisitAttributeValues,
    /// What the queue-fields surface would expose.
    #[serde(default)]
    pub queue: Option<QueueFields>,
}

impl FormFile {
    /// The attribute catalog this form is checked against.
    pub fn attribute_catalog(&self, cfg: &WorkflowConfig) -> AttributeCatalog {
        AttributeCatalog::resolved(cfg.visit_attribute_types(), self.attribute_types.clone())
    }
}

pub fn load_form(path: &Path) -> anyhow::Result<FormFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read form {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("failed to parse form {}", path.display()))
}
