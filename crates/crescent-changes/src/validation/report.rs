//! Validation findings and the aggregated report.

use std::collections::BTreeSet;

use crescent_types::ValidationSeverity;
use serde::{Deserialize, Serialize};

use crate::delta::ChangeSection;

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// Name of the rule that produced the finding.
    pub rule: String,
    /// How serious the finding is.
    pub severity: ValidationSeverity,
    /// The change section the finding is attributed to, if any.
    pub section: Option<ChangeSection>,
    /// The change or creature the finding concerns, when validating many.
    pub subject: Option<String>,
    /// Human-readable description.
    pub message: String,
}

/// Outcome of validating one or more changes or states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether no finding reached the blocking severity.
    pub is_valid: bool,
    /// Findings at or above the blocking severity.
    pub errors: Vec<ValidationFinding>,
    /// Findings below the blocking severity.
    pub warnings: Vec<ValidationFinding>,
}

impl ValidationReport {
    /// Split findings into errors and warnings at `min_blocking`.
    pub fn from_findings(
        findings: Vec<ValidationFinding>,
        min_blocking: ValidationSeverity,
    ) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = findings
            .into_iter()
            .partition(|finding| finding.severity >= min_blocking);
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A passing report with no findings.
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Messages of the blocking findings.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|f| f.message.clone()).collect()
    }

    /// Sections blamed by blocking findings; `None` marks an unattributed
    /// finding.
    pub fn blamed_sections(&self) -> BTreeSet<Option<ChangeSection>> {
        self.errors.iter().map(|f| f.section).collect()
    }
}
