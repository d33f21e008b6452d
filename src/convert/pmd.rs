//! PMD XML report converter.

use serde::Deserialize;

use crate::error::ConversionCause;
use crate::model::{Annotation, AnnotationKind, Severity, Tool};
use crate::paths::relative_to_root;

#[derive(Debug, Deserialize)]
struct PmdXml {
    #[serde(rename = "file", default)]
    files: Vec<FileXml>,
}

#[derive(Debug, Deserialize)]
struct FileXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "violation", default)]
    violations: Vec<ViolationXml>,
}

#[derive(Debug, Deserialize)]
struct ViolationXml {
    #[serde(rename = "@beginline")]
    begin_line: Option<u32>,
    #[serde(rename = "@rule")]
    rule: Option<String>,
    #[serde(rename = "@priority")]
    priority: String,
    #[serde(rename = "$text", default)]
    text: String,
}

/// PMD priorities run from 1 (highest) to 5.
fn severity(priority: &str) -> Result<Severity, ConversionCause> {
    match priority.trim() {
        "1" | "2" => Ok(Severity::High),
        "3" => Ok(Severity::Medium),
        "4" | "5" => Ok(Severity::Low),
        other => Err(ConversionCause::UnknownSeverity(other.to_string())),
    }
}

pub fn parse(xml: &str, workspace_root: &str) -> Result<Vec<Annotation>, ConversionCause> {
    let report: PmdXml = super::parse_xml(xml)?;

    let mut annotations = Vec::new();
    for file in report.files {
        let path = relative_to_root(&file.name, workspace_root);
        for violation in file.violations {
            let text = collapse_whitespace(&violation.text);
            let message = match violation.rule.as_deref().map(str::trim) {
                Some(rule) if !rule.is_empty() => format!("{text} ({rule})"),
                _ => text,
            };
            annotations.push(Annotation {
                path: path.clone(),
                line: violation.begin_line.unwrap_or(0),
                message,
                severity: severity(&violation.priority)?,
                kind: Some(AnnotationKind::CodeSmell),
                tool: Tool::Pmd,
            });
        }
    }
    Ok(annotations)
}

/// PMD wraps violation text across indented lines.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
