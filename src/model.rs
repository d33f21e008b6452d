//! Canonical finding and coverage model shared by every converter.
//!
//! Converters normalize paths to repository-relative, `/`-separated
//! strings before anything leaves them, so the relevance filter can
//! compare paths from different tools directly.

use serde::{Deserialize, Serialize};

// ── Tools ────────────────────────────────────────────────────────

/// The fixed set of report producers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Checkstyle,
    SpotBugs,
    Pmd,
    SonarQube,
    Jacoco,
}

impl Tool {
    pub fn label(self) -> &'static str {
        match self {
            Self::Checkstyle => "Checkstyle",
            Self::SpotBugs => "SpotBugs",
            Self::Pmd => "PMD",
            Self::SonarQube => "SonarQube",
            Self::Jacoco => "Coverage",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Annotation severity ──────────────────────────────────────────

/// Annotation severity as the insights API understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational.
    Low,
    /// Warning.
    Medium,
    /// Error.
    High,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Annotation category used by the insights UI for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationKind {
    Vulnerability,
    CodeSmell,
    Bug,
}

// ── Annotation ───────────────────────────────────────────────────

/// One normalized static-analysis finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Repository-relative path with `/` separators.
    pub path: String,
    /// 1-based line; 0 marks a file-level finding.
    pub line: u32,
    pub message: String,
    pub severity: Severity,
    pub kind: Option<AnnotationKind>,
    /// Tool that reported the finding.
    pub tool: Tool,
}

// ── Coverage ─────────────────────────────────────────────────────

/// Coverage state of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    Covered,
    /// Executed, but some branches were missed.
    Partial,
    Uncovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageLine {
    pub line: u32,
    pub state: LineState,
}

impl CoverageLine {
    pub fn is_covered(&self) -> bool {
        !matches!(self.state, LineState::Uncovered)
    }
}

/// Measured lines of one source file, in report order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<CoverageLine>,
}

impl FileCoverage {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines_covered(&self) -> usize {
        self.lines.iter().filter(|l| l.is_covered()).count()
    }

    /// Line numbers in `state`, in report order.
    pub fn lines_in(&self, state: LineState) -> impl Iterator<Item = u32> + '_ {
        self.lines
            .iter()
            .filter(move |l| l.state == state)
            .map(|l| l.line)
    }
}

/// Aggregated coverage for the files of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub files: Vec<FileCoverage>,
}

impl CoverageReport {
    pub fn new(files: Vec<FileCoverage>) -> Self {
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn lines_covered(&self) -> usize {
        self.files.iter().map(FileCoverage::lines_covered).sum()
    }

    pub fn lines_total(&self) -> usize {
        self.files.iter().map(|f| f.lines.len()).sum()
    }

    /// Covered share in percent; 0 for an empty report.
    pub fn percentage(&self) -> f64 {
        let total = self.lines_total();
        if total == 0 {
            return 0.0;
        }
        (self.lines_covered() as f64 / total as f64) * 100.0
    }
}

// ── Report header ────────────────────────────────────────────────

/// Header registered once per run under the report key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportHeader {
    pub title: String,
    pub reporter: String,
    pub details: String,
    pub logo_url: Option<String>,
}
