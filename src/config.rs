//! Reconciler configuration.
use crate::errors::ReconcilerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Journal every live-tree mutation so a host can replay it.
    pub record_mutations: bool,
}

impl ReconcilerConfig {
    pub fn from_json(json: &str) -> Result<Self, ReconcilerError> {
        serde_json::from_str(json).map_err(|e| ReconcilerError::Config { details: e.to_string() })
    }
}
