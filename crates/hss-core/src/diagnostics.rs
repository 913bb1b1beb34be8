//! Diagnostics infrastructure for tracking issues during a study run.
//!
//! Collects per-item findings from expansion, feasibility checking,
//! scheduling and aggregation so they can be reported once at the end of a
//! stage instead of scattered across call sites. Supports:
//!
//! - Severity levels (Info, Warning, Error, Critical)
//! - Categories for grouping issues (config, feasibility, schedule, merge)
//! - Optional entity references (e.g., "contingency Line_Out", "BASE/Intact")
//! - Serialization for JSON output
//!
//! Critical issues mark conditions that make the rest of the run pointless;
//! callers decide whether to turn them into a fatal error.
//!
//! # Example
//!
//! ```
//! use hss_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("config", "contingency has no resolvable actions");
//! diag.add_error_with_entity("merge", "export could not be parsed", "case_003.csv");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational (e.g., a case pruned by design)
    Info,
    /// Unusual but operation continued (e.g., renamed colliding key)
    Warning,
    /// Could not complete element/operation (e.g., unparsable export)
    Error,
    /// Run-level condition that leaves nothing usable downstream
    Critical,
}

/// A single diagnostic issue encountered during an operation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    /// Severity of the issue
    pub severity: Severity,
    /// Category for grouping (e.g., "config", "feasibility", "merge")
    pub category: String,
    /// Human-readable description of the issue
    pub message: String,
    /// Optional entity reference (e.g., "BASE/Line_Out")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    /// Create a new diagnostic issue
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    /// Add entity reference to the issue
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for an operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// All collected issues
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    /// Create new empty diagnostics
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw issue directly
    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    /// Add an informational note with category and message
    pub fn add_info(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Info, category, message));
    }

    /// Add a warning with category and message
    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    /// Add a warning with entity reference
    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    /// Add an error with category and message
    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    /// Add an error with entity reference
    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    /// Add a critical run-level condition
    pub fn add_critical(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Critical, category, message));
    }

    /// Count issues at a given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Count warning issues
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Count error issues
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Check if there are any issues
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Check if there are any errors or critical issues
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i.severity, Severity::Error | Severity::Critical))
    }

    /// Check if there are any critical issues
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    /// Get issues filtered by category
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// Merge another diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            return "No issues".to_string();
        }
        let mut parts = Vec::new();
        for (severity, label) in [
            (Severity::Critical, "critical"),
            (Severity::Error, "error"),
            (Severity::Warning, "warning"),
            (Severity::Info, "info"),
        ] {
            let n = self.count(severity);
            match n {
                0 => {}
                1 => parts.push(format!("1 {}", label)),
                n => parts.push(format!("{} {}s", n, label)),
            }
        }
        parts.join(", ")
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = Diagnostics::new();
        diag.add_warning("config", "test warning");
        diag.add_error("merge", "test error");
        diag.add_info("feasibility", "pruned by base case");

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.count(Severity::Info), 1);
        assert!(diag.has_issues());
        assert!(diag.has_errors());
        assert!(!diag.has_critical());
    }

    #[test]
    fn test_critical_counts_as_error() {
        let mut diag = Diagnostics::new();
        diag.add_critical("feasibility", "no convergent base case");
        assert!(diag.has_errors());
        assert!(diag.has_critical());
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_error_with_entity("merge", "could not parse export", "case_003.csv");

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"error\""));
        assert!(json.contains("\"entity\": \"case_003.csv\""));
    }

    #[test]
    fn test_diagnostic_issue_display() {
        let issue = DiagnosticIssue::new(Severity::Warning, "merge", "renamed colliding key")
            .with_entity("BASE/Intact");

        let display = format!("{}", issue);
        assert!(display.contains("warning"));
        assert!(display.contains("merge"));
        assert!(display.contains("BASE/Intact"));
    }

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.add_warning("config", "warning");
        assert_eq!(diag.summary(), "1 warning");

        diag.add_error("config", "error");
        diag.add_warning("config", "another warning");
        assert_eq!(diag.summary(), "1 error, 2 warnings");
    }

    #[test]
    fn test_issues_by_category() {
        let mut diag = Diagnostics::new();
        diag.add_warning("config", "config warning");
        diag.add_warning("merge", "merge warning");
        diag.add_error("config", "config error");

        let config_issues: Vec<_> = diag.issues_by_category("config").collect();
        assert_eq!(config_issues.len(), 2);
    }

    #[test]
    fn test_diagnostics_merge() {
        let mut diag1 = Diagnostics::new();
        diag1.add_warning("config", "warning 1");

        let mut diag2 = Diagnostics::new();
        diag2.add_error("merge", "error 1");

        diag1.merge(diag2);
        assert_eq!(diag1.warning_count(), 1);
        assert_eq!(diag1.error_count(), 1);
    }
}
