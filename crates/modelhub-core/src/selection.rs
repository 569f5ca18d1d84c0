//! Default-model selection types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::endpoint::{Endpoint, Model};

/// Warning raised when a stored default had to be cleared.
pub const DEFAULT_UNAVAILABLE_WARNING: &str = "the previous default is no longer available.";

/// Pointer to the platform-wide default (endpoint, model) pair.
///
/// The empty selection is three empty strings, never absent, so consumers
/// have a single value to test for "no default".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultModelSelection {
    #[serde(default)]
    pub endpoint_id: String,

    #[serde(default)]
    pub model_id: String,

    #[serde(default)]
    pub provider: String,
}

impl DefaultModelSelection {
    /// The empty selection `{ "", "", "" }`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Point at a model of an endpoint.
    pub fn new(endpoint: &Endpoint, model: &Model) -> Self {
        Self {
            endpoint_id: endpoint.id.clone(),
            model_id: model.id.clone(),
            provider: endpoint.provider.as_str().to_string(),
        }
    }

    /// Whether no default is set.
    pub fn is_empty(&self) -> bool {
        self.endpoint_id.is_empty() && self.model_id.is_empty()
    }
}

/// One (endpoint, model) pair offered as a default candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectableOption {
    pub endpoint_id: String,
    pub model_id: String,
    pub provider: String,
    pub label: String,
    pub is_selectable: bool,
}

impl SelectableOption {
    /// Whether this option is the pair referenced by `selection`.
    pub fn matches(&self, selection: &DefaultModelSelection) -> bool {
        self.endpoint_id == selection.endpoint_id && self.model_id == selection.model_id
    }

    /// The selection that points at this option.
    pub fn to_selection(&self) -> DefaultModelSelection {
        DefaultModelSelection {
            endpoint_id: self.endpoint_id.clone(),
            model_id: self.model_id.clone(),
            provider: self.provider.clone(),
        }
    }
}

/// Non-fatal notice that the default was demoted to the empty selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionWarning {
    /// The selection that was cleared
    pub previous: DefaultModelSelection,
}

impl SelectionWarning {
    pub fn message(&self) -> &'static str {
        DEFAULT_UNAVAILABLE_WARNING
    }
}

impl fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
