//! JSON bodies for the Bitbucket Code Insights and Code Coverage APIs.

use serde::Serialize;

use crate::model::{Annotation, AnnotationKind, FileCoverage, LineState, ReportHeader, Severity};

/// Annotation messages longer than this are rejected by the API.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody<'a> {
    pub title: &'a str,
    pub reporter: &'a str,
    pub details: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<&'a str>,
}

impl<'a> From<&'a ReportHeader> for ReportBody<'a> {
    fn from(header: &'a ReportHeader) -> Self {
        Self {
            title: &header.title,
            reporter: &header.reporter,
            details: &header.details,
            logo_url: header.logo_url.as_deref().filter(|u| !u.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnnotationBody<'a> {
    pub path: &'a str,
    pub line: u32,
    pub message: String,
    pub severity: Severity,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnnotationKind>,
}

impl<'a> From<&'a Annotation> for AnnotationBody<'a> {
    fn from(annotation: &'a Annotation) -> Self {
        Self {
            path: &annotation.path,
            line: annotation.line,
            message: message_for(annotation),
            severity: annotation.severity,
            kind: annotation.kind,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnnotationsBody<'a> {
    pub annotations: Vec<AnnotationBody<'a>>,
}

impl<'a> AnnotationsBody<'a> {
    pub fn new(batch: &'a [Annotation]) -> Self {
        Self {
            annotations: batch.iter().map(AnnotationBody::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileCoverageBody<'a> {
    pub path: &'a str,
    pub coverage: String,
}

#[derive(Debug, Serialize)]
pub struct CoverageBody<'a> {
    pub files: Vec<FileCoverageBody<'a>>,
}

impl<'a> CoverageBody<'a> {
    pub fn new(files: &'a [FileCoverage]) -> Self {
        Self {
            files: files
                .iter()
                .map(|f| FileCoverageBody {
                    path: &f.path,
                    coverage: coverage_string(f),
                })
                .collect(),
        }
    }
}

/// Tool-prefixed, length-limited message.
fn message_for(annotation: &Annotation) -> String {
    let text = annotation.message.trim();
    let message = if text.is_empty() {
        annotation.tool.label().to_string()
    } else {
        format!("[{}] {}", annotation.tool.label(), text)
    };
    truncate_chars(message, MAX_MESSAGE_CHARS)
}

fn truncate_chars(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

/// `C:1,2;P:3;U:4`, omitting empty groups.
pub fn coverage_string(file: &FileCoverage) -> String {
    [
        ('C', LineState::Covered),
        ('P', LineState::Partial),
        ('U', LineState::Uncovered),
    ]
    .into_iter()
    .filter_map(|(tag, state)| {
        let lines: Vec<String> = file.lines_in(state).map(|n| n.to_string()).collect();
        (!lines.is_empty()).then(|| format!("{tag}:{}", lines.join(",")))
    })
    .collect::<Vec<_>>()
    .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageLine, Tool};

    fn annotation(message: &str) -> Annotation {
        Annotation {
            path: "src/Foo.java".into(),
            line: 3,
            message: message.into(),
            severity: Severity::High,
            kind: Some(AnnotationKind::Bug),
            tool: Tool::SpotBugs,
        }
    }

    #[test]
    fn annotation_body_shape() {
        let a = annotation("Null dereference");
        let json = serde_json::to_value(AnnotationBody::from(&a)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "src/Foo.java",
                "line": 3,
                "message": "[SpotBugs] Null dereference",
                "severity": "HIGH",
                "type": "BUG",
            })
        );
    }

    #[test]
    fn long_messages_are_truncated() {
        let a = annotation(&"x".repeat(5000));
        let body = AnnotationBody::from(&a);
        assert_eq!(body.message.chars().count(), MAX_MESSAGE_CHARS);
        assert!(body.message.ends_with('…'));
    }

    #[test]
    fn empty_message_falls_back_to_tool() {
        let a = annotation("   ");
        assert_eq!(AnnotationBody::from(&a).message, "SpotBugs");
    }

    #[test]
    fn report_body_omits_missing_logo() {
        let header = ReportHeader {
            title: "Code Insights".into(),
            reporter: "ci".into(),
            details: "Checkstyle".into(),
            logo_url: None,
        };
        let json = serde_json::to_value(ReportBody::from(&header)).unwrap();
        assert!(json.get("logoUrl").is_none());
        assert_eq!(json["title"], "Code Insights");
    }

    #[test]
    fn coverage_string_groups_states() {
        let line = |n, state| CoverageLine { line: n, state };
        let file = FileCoverage {
            path: "src/Foo.java".into(),
            lines: vec![
                line(1, LineState::Covered),
                line(2, LineState::Uncovered),
                line(3, LineState::Covered),
                line(4, LineState::Partial),
            ],
        };
        assert_eq!(coverage_string(&file), "C:1,3;P:4;U:2");

        let all_covered = FileCoverage {
            path: "x".into(),
            lines: vec![line(7, LineState::Covered)],
        };
        assert_eq!(coverage_string(&all_covered), "C:7");
    }
}
