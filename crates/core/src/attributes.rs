//! Visit attribute types, collected values, and the required-attribute check.
//!
//! The attribute set is dynamic: which attribute types exist, and which of them
//! are required, is resolved asynchronously by a collaborator after the form
//! opens. The check here therefore runs at submission time only, in addition to
//! the declarative form schema.
//!
//! Which types are required comes from configuration. Loaded definitions only
//! contribute display labels.

use crate::config::ConfiguredAttributeType;
use crate::payload::VisitAttributePayload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved attribute-type definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitAttributeType {
    pub uuid: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl VisitAttributeType {
    pub fn label(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.uuid)
    }
}

/// Availability of the attribute-type definitions.
///
/// `Loading` is not the same as "no attributes": a submit attempted while the
/// definitions are still loading is deferred, not evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeCatalog {
    Loading,
    Ready(Vec<VisitAttributeType>),
}

/// Result of evaluating required attributes against the collected values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeCheck {
    Satisfied,
    Missing(Vec<VisitAttributeType>),
    Loading,
}

impl AttributeCatalog {
    /// A ready catalog from the configured types and whatever definitions loaded.
    pub fn resolved(
        configured: &[ConfiguredAttributeType],
        loaded: Vec<VisitAttributeType>,
    ) -> Self {
        Self::Ready(resolve_attribute_types(configured, loaded))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn check(&self, values: &VisitAttributeValues) -> AttributeCheck {
        match self {
            Self::Loading => AttributeCheck::Loading,
            Self::Ready(types) => {
                let missing: Vec<VisitAttributeType> = missing_required_attributes(types, values)
                    .into_iter()
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    AttributeCheck::Satisfied
                } else {
                    AttributeCheck::Missing(missing)
                }
            }
        }
    }
}

/// Values entered by the user, keyed by attribute-type uuid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitAttributeValues(BTreeMap<String, String>);

impl VisitAttributeValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, attribute_type: impl Into<String>, value: impl Into<String>) {
        self.0.insert(attribute_type.into(), value.into());
    }

    pub fn get(&self, attribute_type: &str) -> Option<&str> {
        self.0.get(attribute_type).map(String::as_str)
    }

    /// Whether a non-empty value has been entered for the attribute type.
    pub fn has_value(&self, attribute_type: &str) -> bool {
        self.get(attribute_type).is_some_and(|v| !v.is_empty())
    }

    /// Entries with a non-empty value, in attribute-type order.
    pub fn to_payload(&self) -> Vec<VisitAttributePayload> {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(attribute_type, value)| VisitAttributePayload {
                attribute_type: attribute_type.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VisitAttributeValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Merge loaded attribute-type definitions with the configured list.
///
/// Configured types come first, in configured order, with their `required`
/// flag; a configured type that did not load is still listed. Loaded types
/// that are not configured are kept as optional.
pub fn resolve_attribute_types(
    configured: &[ConfiguredAttributeType],
    loaded: Vec<VisitAttributeType>,
) -> Vec<VisitAttributeType> {
    let mut resolved: Vec<VisitAttributeType> = configured
        .iter()
        .map(|c| VisitAttributeType {
            uuid: c.uuid.clone(),
            required: c.required,
            display: loaded
                .iter()
                .find(|l| l.uuid == c.uuid)
                .and_then(|l| l.display.clone()),
        })
        .collect();

    resolved.extend(
        loaded
            .into_iter()
            .filter(|l| !configured.iter().any(|c| c.uuid == l.uuid))
            .map(|l| VisitAttributeType {
                required: false,
                ..l
            }),
    );
    resolved
}

/// Required attribute types that have no non-empty value.
pub fn missing_required_attributes<'a>(
    types: &'a [VisitAttributeType],
    values: &VisitAttributeValues,
) -> Vec<&'a VisitAttributeType> {
    types
        .iter()
        .filter(|t| t.required && !values.has_value(&t.uuid))
        .collect()
}

/// Whether at least one required attribute type has no non-empty value.
pub fn has_missing_required_attributes(
    types: &[VisitAttributeType],
    values: &VisitAttributeValues,
) -> bool {
    types
        .iter()
        .any(|t| t.required && !values.has_value(&t.uuid))
}
