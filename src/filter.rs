//! Relevance filter: keep only findings on files the commit changed.

use crate::changeset::ChangeSet;
use crate::model::{Annotation, CoverageReport};

/// Keep annotations whose path is in `changes`, preserving input order.
pub fn annotations(findings: Vec<Annotation>, changes: &ChangeSet) -> Vec<Annotation> {
    findings
        .into_iter()
        .filter(|a| changes.contains(&a.path))
        .collect()
}

/// Keep measured files whose path is in `changes`, preserving input order.
pub fn coverage(report: CoverageReport, changes: &ChangeSet) -> CoverageReport {
    CoverageReport::new(
        report
            .files
            .into_iter()
            .filter(|f| !f.is_empty() && changes.contains(&f.path))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageLine, FileCoverage, LineState, Severity, Tool};

    fn finding(path: &str, line: u32) -> Annotation {
        Annotation {
            path: path.into(),
            line,
            message: format!("issue at {path}:{line}"),
            severity: Severity::Medium,
            kind: None,
            tool: Tool::Checkstyle,
        }
    }

    #[test]
    fn drops_findings_on_unchanged_files() {
        let changes: ChangeSet = ["src/Foo.java"].into_iter().collect();
        let kept = annotations(
            vec![finding("src/Foo.java", 10), finding("src/Bar.java", 5)],
            &changes,
        );
        assert_eq!(kept, vec![finding("src/Foo.java", 10)]);
    }

    #[test]
    fn preserves_relative_order() {
        let changes: ChangeSet = ["a.java", "c.java"].into_iter().collect();
        let input = vec![
            finding("c.java", 3),
            finding("b.java", 1),
            finding("a.java", 9),
            finding("c.java", 1),
        ];
        let kept = annotations(input.clone(), &changes);
        let expected: Vec<_> = input.into_iter().filter(|f| f.path != "b.java").collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn empty_change_set_keeps_nothing() {
        let kept = annotations(vec![finding("a.java", 1)], &ChangeSet::default());
        assert!(kept.is_empty());
    }

    #[test]
    fn coverage_drops_unchanged_and_empty_files() {
        let changes: ChangeSet = ["src/A.java", "src/Empty.java"].into_iter().collect();
        let line = CoverageLine {
            line: 1,
            state: LineState::Covered,
        };
        let report = CoverageReport::new(vec![
            FileCoverage {
                path: "src/A.java".into(),
                lines: vec![line],
            },
            FileCoverage {
                path: "src/B.java".into(),
                lines: vec![line],
            },
            FileCoverage {
                path: "src/Empty.java".into(),
                lines: vec![],
            },
        ]);
        let kept = coverage(report, &changes);
        assert_eq!(kept.files.len(), 1);
        assert_eq!(kept.files[0].path, "src/A.java");
    }
}
