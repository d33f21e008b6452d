//! Jacoco XML coverage converter.

use serde::Deserialize;

use crate::error::ConversionCause;
use crate::model::{CoverageLine, CoverageReport, FileCoverage, LineState};
use crate::paths::join_source;

#[derive(Debug, Deserialize)]
struct ReportXml {
    #[serde(rename = "group", default)]
    groups: Vec<GroupXml>,
    #[serde(rename = "package", default)]
    packages: Vec<PackageXml>,
}

/// Multi-module reports nest packages inside (possibly nested) groups.
#[derive(Debug, Deserialize)]
struct GroupXml {
    #[serde(rename = "group", default)]
    groups: Vec<GroupXml>,
    #[serde(rename = "package", default)]
    packages: Vec<PackageXml>,
}

#[derive(Debug, Deserialize)]
struct PackageXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "sourcefile", default)]
    source_files: Vec<SourceFileXml>,
}

#[derive(Debug, Deserialize)]
struct SourceFileXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "line", default)]
    lines: Vec<LineXml>,
}

#[derive(Debug, Deserialize)]
struct LineXml {
    #[serde(rename = "@nr")]
    nr: u32,
    /// Covered instructions.
    #[serde(rename = "@ci", default)]
    ci: u32,
    /// Missed branches.
    #[serde(rename = "@mb", default)]
    mb: u32,
}

impl LineXml {
    fn state(&self) -> LineState {
        if self.ci == 0 {
            LineState::Uncovered
        } else if self.mb > 0 {
            LineState::Partial
        } else {
            LineState::Covered
        }
    }
}

fn collect_packages<'a>(
    groups: &'a [GroupXml],
    packages: &'a [PackageXml],
    out: &mut Vec<&'a PackageXml>,
) {
    out.extend(packages.iter());
    for group in groups {
        collect_packages(&group.groups, &group.packages, out);
    }
}

/// Parse a Jacoco report; files without measured lines are dropped.
pub fn parse(xml: &str, src_path: &str) -> Result<CoverageReport, ConversionCause> {
    let report: ReportXml = super::parse_xml(xml)?;

    let mut packages = Vec::new();
    collect_packages(&report.groups, &report.packages, &mut packages);

    let files = packages
        .into_iter()
        .flat_map(|package| {
            package.source_files.iter().map(move |file| {
                let relative = if package.name.is_empty() {
                    file.name.clone()
                } else {
                    format!("{}/{}", package.name, file.name)
                };
                FileCoverage {
                    path: join_source(src_path, &relative),
                    lines: file
                        .lines
                        .iter()
                        .map(|l| CoverageLine {
                            line: l.nr,
                            state: l.state(),
                        })
                        .collect(),
                }
            })
        })
        .filter(|file| !file.is_empty())
        .collect();

    Ok(CoverageReport::new(files))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="acme">
  <sessioninfo id="host-1" start="1700000000000" dump="1700000001000"/>
  <package name="com/acme">
    <class name="com/acme/Foo" sourcefilename="Foo.java">
      <method name="run" desc="()V" line="10">
        <counter type="INSTRUCTION" missed="0" covered="5"/>
      </method>
    </class>
    <sourcefile name="Foo.java">
      <line nr="10" mi="0" ci="3" mb="0" cb="0"/>
      <line nr="11" mi="0" ci="2" mb="1" cb="1"/>
      <line nr="12" mi="4" ci="0" mb="0" cb="0"/>
      <counter type="LINE" missed="1" covered="2"/>
    </sourcefile>
    <sourcefile name="Empty.java">
      <counter type="LINE" missed="0" covered="0"/>
    </sourcefile>
    <counter type="LINE" missed="1" covered="2"/>
  </package>
  <counter type="LINE" missed="1" covered="2"/>
</report>"#;

    #[test]
    fn converts_line_states() {
        let report = parse(REPORT, "src/main/java").unwrap();
        assert_eq!(report.files.len(), 1, "files without lines are dropped");

        let foo = &report.files[0];
        assert_eq!(foo.path, "src/main/java/com/acme/Foo.java");
        let states: Vec<_> = foo.lines.iter().map(|l| (l.line, l.state)).collect();
        assert_eq!(
            states,
            vec![
                (10, LineState::Covered),
                (11, LineState::Partial),
                (12, LineState::Uncovered),
            ]
        );
        assert_eq!(report.lines_covered(), 2);
        assert_eq!(report.lines_total(), 3);
    }

    #[test]
    fn grouped_reports_are_flattened() {
        let xml = r#"<report name="all">
  <group name="module-a">
    <package name="a"><sourcefile name="A.java"><line nr="1" mi="0" ci="1" mb="0" cb="0"/></sourcefile></package>
    <group name="nested">
      <package name="b"><sourcefile name="B.java"><line nr="2" mi="1" ci="0" mb="0" cb="0"/></sourcefile></package>
    </group>
  </group>
</report>"#;
        let report = parse(xml, "src").unwrap();
        let paths: Vec<_> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a/A.java", "src/b/B.java"]);
    }

    #[test]
    fn report_without_packages_is_empty() {
        let report = parse(r#"<report name="x"/>"#, "src").unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn default_package_has_no_prefix() {
        let xml = r#"<report name="x"><package name=""><sourcefile name="Main.java"><line nr="1" mi="0" ci="1" mb="0" cb="0"/></sourcefile></package></report>"#;
        let report = parse(xml, "src/main/java").unwrap();
        assert_eq!(report.files[0].path, "src/main/java/Main.java");
    }
}
