//! Report converters and the registry that decides which ones run.
//!
//! ## Architecture
//!
//! ```text
//! checkstyle.xml ─▸ Checkstyle ─┐
//! spotbugs.xml   ─▸ SpotBugs   ─┤
//! pmd.xml        ─▸ PMD        ─┼─▸ Vec<Annotation>
//! SonarQube API  ─▸ SonarQube  ─┘
//! jacoco.xml     ─▸ Coverage   ───▸ CoverageReport
//! ```
//!
//! The tool set is fixed, so converters are a closed enum selected by
//! [`ConverterSetBuilder`]. A converter is configured only when its
//! report path (or server URL) is non-blank.

pub mod checkstyle;
pub mod coverage;
pub mod pmd;
pub mod sonarqube;
pub mod spotbugs;

use serde::de::DeserializeOwned;

use crate::error::{ConversionCause, ConversionError};
use crate::model::{Annotation, CoverageReport, Tool};
use crate::workspace::FileTransfer;

pub use sonarqube::{SonarAuth, SonarQubeSettings, SonarQubeSource};

/// Deserialize a report document. DOCTYPE declarations are skipped and
/// never resolved.
pub(crate) fn parse_xml<T: DeserializeOwned>(xml: &str) -> Result<T, ConversionCause> {
    Ok(quick_xml::de::from_str(xml)?)
}

// ── Annotation converters ────────────────────────────────────────

/// One configured annotation producer.
#[derive(Debug)]
pub enum AnnotationConverter {
    Checkstyle { report_path: String, workspace_root: String },
    SpotBugs { report_path: String, src_path: String },
    Pmd { report_path: String, workspace_root: String },
    SonarQube(SonarQubeSource),
}

impl AnnotationConverter {
    pub fn tool(&self) -> Tool {
        match self {
            Self::Checkstyle { .. } => Tool::Checkstyle,
            Self::SpotBugs { .. } => Tool::SpotBugs,
            Self::Pmd { .. } => Tool::Pmd,
            Self::SonarQube(_) => Tool::SonarQube,
        }
    }

    /// Report file path, or server URL for SonarQube.
    pub fn source(&self) -> &str {
        match self {
            Self::Checkstyle { report_path, .. }
            | Self::SpotBugs { report_path, .. }
            | Self::Pmd { report_path, .. } => report_path,
            Self::SonarQube(source) => &source.settings().url,
        }
    }

    /// Produce normalized annotations. Only SonarQube touches the network.
    pub async fn convert(&self, files: &dyn FileTransfer) -> Result<Vec<Annotation>, ConversionError> {
        let fail = |cause: ConversionCause| ConversionError::new(self.tool(), self.source(), cause);
        match self {
            Self::Checkstyle {
                report_path,
                workspace_root,
            } => {
                let xml = files.read_to_string(report_path).map_err(|e| fail(e.into()))?;
                checkstyle::parse(&xml, workspace_root).map_err(fail)
            }
            Self::SpotBugs {
                report_path,
                src_path,
            } => {
                let xml = files.read_to_string(report_path).map_err(|e| fail(e.into()))?;
                spotbugs::parse(&xml, src_path).map_err(fail)
            }
            Self::Pmd {
                report_path,
                workspace_root,
            } => {
                let xml = files.read_to_string(report_path).map_err(|e| fail(e.into()))?;
                pmd::parse(&xml, workspace_root).map_err(fail)
            }
            Self::SonarQube(source) => source.fetch().await.map_err(fail),
        }
    }
}

// ── Coverage converter ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CoverageConverter {
    pub report_path: String,
    pub src_path: String,
}

impl CoverageConverter {
    pub fn convert(&self, files: &dyn FileTransfer) -> Result<CoverageReport, ConversionError> {
        let fail = |cause: ConversionCause| {
            ConversionError::new(Tool::Jacoco, self.report_path.clone(), cause)
        };
        let xml = files.read_to_string(&self.report_path).map_err(|e| fail(e.into()))?;
        coverage::parse(&xml, &self.src_path).map_err(fail)
    }
}

// ── Registry ─────────────────────────────────────────────────────

/// Converters selected for one run, in execution order.
#[derive(Debug, Default)]
pub struct ConverterSet {
    pub annotations: Vec<AnnotationConverter>,
    pub coverage: Option<CoverageConverter>,
}

impl ConverterSet {
    pub fn tools(&self) -> Vec<Tool> {
        self.annotations
            .iter()
            .map(AnnotationConverter::tool)
            .chain(self.coverage.as_ref().map(|_| Tool::Jacoco))
            .collect()
    }
}

/// Accumulates converter configurations.
///
/// Each setter is a no-op for a blank path. [`build`](Self::build)
/// always yields Checkstyle, SpotBugs, PMD, SonarQube order regardless
/// of setter call order.
#[derive(Debug, Default)]
pub struct ConverterSetBuilder {
    checkstyle: Option<AnnotationConverter>,
    spotbugs: Option<AnnotationConverter>,
    pmd: Option<AnnotationConverter>,
    sonarqube: Option<SonarQubeSettings>,
    coverage: Option<CoverageConverter>,
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl ConverterSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_checkstyle(mut self, report_path: &str, workspace_root: &str) -> Self {
        if let Some(report_path) = non_blank(report_path) {
            self.checkstyle = Some(AnnotationConverter::Checkstyle {
                report_path,
                workspace_root: workspace_root.to_string(),
            });
        }
        self
    }

    pub fn set_spotbugs(mut self, report_path: &str, src_path: &str) -> Self {
        if let Some(report_path) = non_blank(report_path) {
            self.spotbugs = Some(AnnotationConverter::SpotBugs {
                report_path,
                src_path: src_path.to_string(),
            });
        }
        self
    }

    pub fn set_pmd(mut self, report_path: &str, workspace_root: &str) -> Self {
        if let Some(report_path) = non_blank(report_path) {
            self.pmd = Some(AnnotationConverter::Pmd {
                report_path,
                workspace_root: workspace_root.to_string(),
            });
        }
        self
    }

    pub fn set_sonarqube(mut self, settings: SonarQubeSettings) -> Self {
        if non_blank(&settings.url).is_some() && non_blank(&settings.project_key).is_some() {
            self.sonarqube = Some(settings);
        }
        self
    }

    pub fn set_coverage(mut self, report_path: &str, src_path: &str) -> Self {
        if let Some(report_path) = non_blank(report_path) {
            self.coverage = Some(CoverageConverter {
                report_path,
                src_path: src_path.to_string(),
            });
        }
        self
    }

    /// Drop every annotation converter; coverage is kept.
    pub fn without_annotations(mut self) -> Self {
        self.checkstyle = None;
        self.spotbugs = None;
        self.pmd = None;
        self.sonarqube = None;
        self
    }

    pub fn build(self) -> Result<ConverterSet, ConversionError> {
        let sonarqube = match self.sonarqube {
            Some(settings) => {
                let url = settings.url.clone();
                let source = SonarQubeSource::new(settings)
                    .map_err(|cause| ConversionError::new(Tool::SonarQube, url, cause))?;
                Some(AnnotationConverter::SonarQube(source))
            }
            None => None,
        };

        let annotations = [self.checkstyle, self.spotbugs, self.pmd, sonarqube]
            .into_iter()
            .flatten()
            .collect();
        Ok(ConverterSet {
            annotations,
            coverage: self.coverage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::workspace::LocalWorkspace;
    use std::time::Duration;

    fn sonar(url: &str) -> SonarQubeSettings {
        SonarQubeSettings {
            url: url.into(),
            project_key: "acme".into(),
            auth: SonarAuth::Anonymous,
            timeout: Duration::from_secs(1),
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn blank_paths_configure_nothing() {
        let set = ConverterSetBuilder::new()
            .set_checkstyle("", "/ws")
            .set_spotbugs("   ", "src")
            .set_pmd("", "/ws")
            .set_sonarqube(sonar(""))
            .set_coverage("", "src")
            .build()
            .unwrap();
        assert!(set.annotations.is_empty());
        assert!(set.coverage.is_none());
    }

    #[test]
    fn build_order_is_fixed() {
        let set = ConverterSetBuilder::new()
            .set_sonarqube(sonar("http://sonar.local"))
            .set_pmd("pmd.xml", "/ws")
            .set_coverage("jacoco.xml", "src")
            .set_checkstyle("checkstyle.xml", "/ws")
            .set_spotbugs("spotbugs.xml", "src")
            .build()
            .unwrap();
        assert_eq!(
            set.tools(),
            vec![
                Tool::Checkstyle,
                Tool::SpotBugs,
                Tool::Pmd,
                Tool::SonarQube,
                Tool::Jacoco
            ]
        );
    }

    #[test]
    fn without_annotations_keeps_coverage() {
        let set = ConverterSetBuilder::new()
            .set_checkstyle("checkstyle.xml", "/ws")
            .set_coverage("jacoco.xml", "src")
            .without_annotations()
            .build()
            .unwrap();
        assert_eq!(set.tools(), vec![Tool::Jacoco]);
    }

    #[tokio::test]
    async fn missing_report_names_tool_and_file() {
        let ws = tempfile::tempdir().unwrap();
        let files = LocalWorkspace::new(ws.path());
        let set = ConverterSetBuilder::new()
            .set_pmd("build/pmd.xml", "/ws")
            .build()
            .unwrap();
        let err = set.annotations[0].convert(&files).await.unwrap_err();
        assert_eq!(err.tool, Tool::Pmd);
        assert_eq!(err.source_path, "build/pmd.xml");
        assert!(matches!(err.cause, ConversionCause::Io(_)));
    }

    #[tokio::test]
    async fn converts_report_read_through_workspace() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(
            ws.path().join("checkstyle.xml"),
            r#"<checkstyle><file name="/ws/src/Foo.java"><error line="2" severity="error" message="m"/></file></checkstyle>"#,
        )
        .unwrap();
        let files = LocalWorkspace::new(ws.path());
        let set = ConverterSetBuilder::new()
            .set_checkstyle("checkstyle.xml", "/ws")
            .build()
            .unwrap();
        let annotations = set.annotations[0].convert(&files).await.unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].path, "src/Foo.java");
    }
}
