//! Validation report types

use serde::{Deserialize, Serialize};

use crate::error::RecoveryHint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    NoNodes,
    LowImportResolutionRate,
    GraphIntegrityError,
}

/// Outcome of validating a codebase graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recovery: Vec<RecoveryHint>,
    /// Observed import resolution rate; `None` when there are no imports.
    pub resolution_rate: Option<f64>,
}

impl ValidationResult {
    pub fn success(resolution_rate: Option<f64>, warnings: Vec<String>) -> Self {
        ValidationResult {
            status: ValidationStatus::Success,
            errors: Vec::new(),
            warnings,
            recovery: Vec::new(),
            resolution_rate,
        }
    }

    pub fn failure(status: ValidationStatus, errors: Vec<String>, recovery: Vec<RecoveryHint>) -> Self {
        ValidationResult {
            status,
            errors,
            warnings: Vec::new(),
            recovery,
            resolution_rate: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ValidationStatus::Success
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
