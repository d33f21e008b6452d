//! SpotBugs XML report converter.
//!
//! SpotBugs reports locations package-qualified (`com/acme/Foo.java`);
//! joining them onto the source root yields the repository path the
//! other tools report.

use serde::Deserialize;

use crate::error::ConversionCause;
use crate::model::{Annotation, AnnotationKind, Severity, Tool};
use crate::paths::join_source;

#[derive(Debug, Deserialize)]
struct BugCollectionXml {
    #[serde(rename = "BugInstance", default)]
    bugs: Vec<BugInstanceXml>,
}

#[derive(Debug, Deserialize)]
struct BugInstanceXml {
    #[serde(rename = "@type")]
    bug_type: String,
    #[serde(rename = "@priority")]
    priority: String,
    #[serde(rename = "@category")]
    category: Option<String>,
    #[serde(rename = "ShortMessage")]
    short_message: Option<String>,
    #[serde(rename = "LongMessage")]
    long_message: Option<String>,
    #[serde(rename = "Class", default)]
    classes: Vec<AnchorXml>,
    #[serde(rename = "Method", default)]
    methods: Vec<AnchorXml>,
    #[serde(rename = "SourceLine", default)]
    source_lines: Vec<SourceLineXml>,
}

/// `Class` / `Method` elements, which carry their own `SourceLine`.
#[derive(Debug, Deserialize)]
struct AnchorXml {
    #[serde(rename = "@primary")]
    primary: Option<bool>,
    #[serde(rename = "SourceLine")]
    source_line: Option<SourceLineXml>,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceLineXml {
    #[serde(rename = "@classname")]
    classname: Option<String>,
    #[serde(rename = "@start")]
    start: Option<u32>,
    #[serde(rename = "@sourcepath")]
    sourcepath: Option<String>,
    #[serde(rename = "@role")]
    role: Option<String>,
}

/// SpotBugs confidence: 1 high, 2 normal, 3 low.
fn severity(priority: &str) -> Result<Severity, ConversionCause> {
    match priority.trim() {
        "1" => Ok(Severity::High),
        "2" => Ok(Severity::Medium),
        "3" => Ok(Severity::Low),
        other => Err(ConversionCause::UnknownSeverity(other.to_string())),
    }
}

fn kind(category: Option<&str>) -> AnnotationKind {
    match category.map(str::trim) {
        Some("SECURITY") | Some("MALICIOUS_CODE") => AnnotationKind::Vulnerability,
        Some("CORRECTNESS") | Some("MT_CORRECTNESS") | Some("BAD_PRACTICE") => AnnotationKind::Bug,
        _ => AnnotationKind::CodeSmell,
    }
}

impl BugInstanceXml {
    /// Instance-level source line first, then primary method, then class.
    fn location(&self) -> Option<&SourceLineXml> {
        fn anchored(anchors: &[AnchorXml]) -> Option<&SourceLineXml> {
            anchors
                .iter()
                .find(|a| a.primary.unwrap_or(false))
                .or_else(|| anchors.first())
                .and_then(|a| a.source_line.as_ref())
        }
        self.source_lines
            .iter()
            .find(|l| l.role.is_none())
            .or_else(|| self.source_lines.first())
            .or_else(|| anchored(&self.methods))
            .or_else(|| anchored(&self.classes))
    }

    fn message(&self) -> String {
        [&self.long_message, &self.short_message]
            .into_iter()
            .flatten()
            .map(|m| m.trim())
            .find(|m| !m.is_empty())
            .unwrap_or(self.bug_type.as_str())
            .to_string()
    }
}

/// `com.acme.Foo$Inner` → `com/acme/Foo.java`.
fn path_from_classname(classname: &str) -> String {
    let outer = classname.split('$').next().unwrap_or(classname);
    format!("{}.java", outer.replace('.', "/"))
}

pub fn parse(xml: &str, src_path: &str) -> Result<Vec<Annotation>, ConversionCause> {
    let report: BugCollectionXml = super::parse_xml(xml)?;

    let mut annotations = Vec::with_capacity(report.bugs.len());
    for bug in &report.bugs {
        let location = bug.location().ok_or(ConversionCause::MissingAttribute("SourceLine"))?;
        let relative = match (&location.sourcepath, &location.classname) {
            (Some(sourcepath), _) => sourcepath.clone(),
            (None, Some(classname)) => path_from_classname(classname),
            (None, None) => return Err(ConversionCause::MissingAttribute("sourcepath")),
        };
        annotations.push(Annotation {
            path: join_source(src_path, &relative),
            line: location.start.unwrap_or(0),
            message: bug.message(),
            severity: severity(&bug.priority)?,
            kind: Some(kind(bug.category.as_deref())),
            tool: Tool::SpotBugs,
        });
    }
    Ok(annotations)
}
