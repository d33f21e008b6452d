//! Checkstyle XML report converter.
//!
//! ```xml
//! <checkstyle version="10.12">
//!   <file name="/ws/src/main/java/Foo.java">
//!     <error line="10" column="5" severity="warning" message="..." source="...FinalParametersCheck"/>
//!   </file>
//! </checkstyle>
//! ```

use serde::Deserialize;

use crate::error::ConversionCause;
use crate::model::{Annotation, AnnotationKind, Severity, Tool};
use crate::paths::relative_to_root;

#[derive(Debug, Deserialize)]
struct CheckstyleXml {
    #[serde(rename = "file", default)]
    files: Vec<FileXml>,
}

#[derive(Debug, Deserialize)]
struct FileXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "error", default)]
    errors: Vec<ErrorXml>,
}

#[derive(Debug, Deserialize)]
struct ErrorXml {
    #[serde(rename = "@line")]
    line: Option<u32>,
    #[serde(rename = "@severity")]
    severity: String,
    #[serde(rename = "@message", default)]
    message: String,
    #[serde(rename = "@source")]
    source: Option<String>,
}

/// Map a Checkstyle severity token.
fn severity(token: &str) -> Result<Severity, ConversionCause> {
    match token.trim().to_ascii_lowercase().as_str() {
        "error" => Ok(Severity::High),
        "warning" => Ok(Severity::Medium),
        "info" | "ignore" => Ok(Severity::Low),
        _ => Err(ConversionCause::UnknownSeverity(token.to_string())),
    }
}

/// `com.puppycrawl.tools.checkstyle.checks.FinalParametersCheck` → `FinalParameters`.
fn rule_name(source: &str) -> &str {
    let short = source.rsplit('.').next().unwrap_or(source);
    short.strip_suffix("Check").filter(|s| !s.is_empty()).unwrap_or(short)
}

pub fn parse(xml: &str, workspace_root: &str) -> Result<Vec<Annotation>, ConversionCause> {
    let report: CheckstyleXml = super::parse_xml(xml)?;

    let mut annotations = Vec::new();
    for file in report.files {
        let path = relative_to_root(&file.name, workspace_root);
        for error in file.errors {
            let message = match error.source.as_deref().map(rule_name) {
                Some(rule) if !rule.is_empty() => format!("{} ({})", error.message.trim(), rule),
                _ => error.message.trim().to_string(),
            };
            annotations.push(Annotation {
                path: path.clone(),
                line: error.line.unwrap_or(0),
                message,
                severity: severity(&error.severity)?,
                kind: Some(AnnotationKind::CodeSmell),
                tool: Tool::Checkstyle,
            });
        }
    }
    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<checkstyle version="10.12.4">
  <file name="/ws/src/main/java/com/acme/Foo.java">
    <error line="10" column="5" severity="warning" message="Parameter x should be final." source="com.puppycrawl.tools.checkstyle.checks.FinalParametersCheck"/>
    <error severity="error" message="File does not end with a newline."/>
  </file>
  <file name="/ws/src/main/java/com/acme/Clean.java">
  </file>
  <file name="/ws/src/main/java/com/acme/Bar.java">
    <error line="3" severity="info" message="Import order."/>
  </file>
</checkstyle>"#;

    #[test]
    fn converts_findings_with_relative_paths() {
        let annotations = parse(REPORT, "/ws").unwrap();
        assert_eq!(annotations.len(), 3);

        assert_eq!(annotations[0].path, "src/main/java/com/acme/Foo.java");
        assert_eq!(annotations[0].line, 10);
        assert_eq!(annotations[0].severity, Severity::Medium);
        assert_eq!(annotations[0].message, "Parameter x should be final. (FinalParameters)");
        assert_eq!(annotations[0].tool, Tool::Checkstyle);

        assert_eq!(annotations[1].line, 0, "missing line is file-level");
        assert_eq!(annotations[1].severity, Severity::High);

        assert_eq!(annotations[2].path, "src/main/java/com/acme/Bar.java");
        assert_eq!(annotations[2].severity, Severity::Low);
    }

    #[test]
    fn empty_report_yields_nothing() {
        assert!(parse(r#"<checkstyle version="10"></checkstyle>"#, "/ws").unwrap().is_empty());
        assert!(parse(r#"<checkstyle/>"#, "/ws").unwrap().is_empty());
    }

    #[test]
    fn unknown_severity_fails_loudly() {
        let xml = r#"<checkstyle><file name="/ws/A.java"><error line="1" severity="fatal" message="m"/></file></checkstyle>"#;
        let err = parse(xml, "/ws").unwrap_err();
        assert!(matches!(err, ConversionCause::UnknownSeverity(ref t) if t == "fatal"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse("<checkstyle><file name=", "/ws"),
            Err(ConversionCause::Xml(_))
        ));
    }

    #[test]
    fn rule_name_shortening() {
        assert_eq!(rule_name("a.b.LineLengthCheck"), "LineLength");
        assert_eq!(rule_name("Check"), "Check");
        assert_eq!(rule_name("custom"), "custom");
    }
}
