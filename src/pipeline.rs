//! Run orchestration.
//!
//! A run is linear and happens exactly once:
//!
//! 1. **Resolve** the change set (fatal on failure, nothing is published)
//! 2. **Build** the converters selected by the configured report paths
//! 3. **Register** the report header under the report key
//! 4. For each annotation converter: **convert → filter → publish**
//! 5. Coverage, when configured: **convert → filter → publish**
//!
//! Failures after step 1 are isolated: they are recorded in the run log
//! and the run continues with the next tool.

use crate::changeset::{ChangeSet, VersionControl};
use crate::config::Config;
use crate::convert::{AnnotationConverter, ConverterSet, ConverterSetBuilder, CoverageConverter};
use crate::error::{ChangeSetError, ConversionError, PipelineError};
use crate::filter;
use crate::model::{ReportHeader, Tool};
use crate::publish::{post_annotations, AnnotationBudget, InsightsPublisher};
use crate::run_log::{RunLog, StepFailure};
use crate::workspace::FileTransfer;

// ── Outcome ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Done,
    /// Every step ran, but at least one conversion or publish call failed.
    PartialFailure,
}

/// Per-tool counts. For coverage the unit is files, not lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStats {
    pub tool: Tool,
    pub found: usize,
    pub kept: usize,
    pub published: usize,
}

impl ToolStats {
    fn new(tool: Tool) -> Self {
        Self {
            tool,
            found: 0,
            kept: 0,
            published: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    pub changed_files: usize,
    pub report_registered: bool,
    pub dry_run: bool,
    pub tools: Vec<ToolStats>,
    pub failures: Vec<StepFailure>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    pub fn stats(&self, tool: Tool) -> Option<&ToolStats> {
        self.tools.iter().find(|s| s.tool == tool)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        writeln!(f, "Code Insights summary{mode}")?;
        writeln!(f, "  changed files: {}", self.changed_files)?;
        writeln!(f, "  {:<12} {:>7} {:>7} {:>9}", "tool", "found", "kept", "published")?;
        for s in &self.tools {
            writeln!(
                f,
                "  {:<12} {:>7} {:>7} {:>9}",
                s.tool.label(),
                s.found,
                s.kept,
                s.published
            )?;
        }
        if self.failures.is_empty() {
            write!(f, "  no failures")
        } else {
            write!(f, "  {} failure(s):", self.failures.len())?;
            for failure in &self.failures {
                write!(f, "\n    - {failure}")?;
            }
            Ok(())
        }
    }
}

// ── Converter selection ──────────────────────────────────────────

/// Converters for `config`; annotation converters only when a report
/// key is set.
pub fn converter_set(config: &Config) -> Result<ConverterSet, ConversionError> {
    let root = config.report_root();
    let builder = ConverterSetBuilder::new()
        .set_checkstyle(&config.checkstyle_file_path, &root)
        .set_spotbugs(&config.spotbugs_file_path, &config.src_path)
        .set_pmd(&config.pmd_file_path, &root)
        .set_sonarqube(config.sonarqube_settings())
        .set_coverage(&config.jacoco_file_path, &config.src_path);

    if config.publishes_annotations() {
        builder.build()
    } else {
        builder.without_annotations().build()
    }
}

/// Header published before any converter runs, naming the tools configured.
pub fn report_header(config: &Config, tools: &[Tool]) -> ReportHeader {
    let details = if tools.is_empty() {
        "No analysis tools configured".to_string()
    } else {
        tools.iter().map(|t| t.label()).collect::<Vec<_>>().join(", ")
    };
    ReportHeader {
        title: config.publish.report_title.clone(),
        reporter: config.publish.reporter.clone(),
        details,
        logo_url: config.publish.logo_url.clone(),
    }
}

// ── Pipeline ─────────────────────────────────────────────────────

pub struct Pipeline<'a> {
    config: &'a Config,
    files: &'a dyn FileTransfer,
    vcs: &'a dyn VersionControl,
    publisher: &'a dyn InsightsPublisher,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        files: &'a dyn FileTransfer,
        vcs: &'a dyn VersionControl,
        publisher: &'a dyn InsightsPublisher,
    ) -> Self {
        Self {
            config,
            files,
            vcs,
            publisher,
            dry_run: false,
        }
    }

    /// Convert and filter, but skip every publish call.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let mut log = RunLog::start(&self.config.commit_id, &self.config.report_key);

        let changes = self.resolve_changes()?;
        let converters = converter_set(self.config)?;
        let mut tools = Vec::new();

        let report_registered = self.register_report(&converters, &mut log).await;
        if report_registered || self.dry_run {
            let mut budget = AnnotationBudget::new(self.config.publish.max_annotations);
            for converter in &converters.annotations {
                tools.push(
                    self.annotate(converter, &changes, &mut budget, &mut log)
                        .await,
                );
            }
        } else if !converters.annotations.is_empty() {
            tracing::warn!(
                skipped = converters.annotations.len(),
                "Report header not registered, skipping annotation converters"
            );
        }

        if let Some(coverage) = &converters.coverage {
            tools.push(self.cover(coverage, &changes, &mut log).await);
        }

        let failures = log.finish();
        let state = if failures.is_empty() {
            RunState::Done
        } else {
            RunState::PartialFailure
        };
        Ok(RunOutcome {
            state,
            changed_files: changes.len(),
            report_registered,
            dry_run: self.dry_run,
            tools,
            failures,
        })
    }

    fn resolve_changes(&self) -> Result<ChangeSet, ChangeSetError> {
        // Scoped copy is cleaned up when `git_dir` drops.
        let git_dir = self
            .files
            .materialize(&self.config.git_dir)
            .map_err(|e| ChangeSetError::Repository {
                path: self.config.git_dir.clone(),
                reason: e.to_string(),
            })?;
        let detector = self.vcs.open(git_dir.path())?;
        let changes = detector.detect(&self.config.commit_id, &self.config.base_branch)?;
        tracing::info!(
            changed = changes.len(),
            base = %self.config.base_branch,
            scoped_copy = git_dir.is_scoped(),
            "Change set resolved"
        );
        tracing::debug!(paths = ?changes.sorted(), "Changed files");
        Ok(changes)
    }

    /// Upsert the header. Returns whether annotations may be posted.
    async fn register_report(&self, converters: &ConverterSet, log: &mut RunLog) -> bool {
        if !self.config.publishes_annotations() {
            tracing::info!("No report key, annotation publishing disabled");
            return false;
        }
        let header = report_header(self.config, &converters.tools());
        if self.dry_run {
            tracing::info!(title = %header.title, details = %header.details, "Dry run: would register report");
            return false;
        }
        match self.publisher.put_report(&header).await {
            Ok(()) => true,
            Err(e) => {
                log.publish_failed("put-report", None, &e);
                false
            }
        }
    }

    async fn annotate(
        &self,
        converter: &AnnotationConverter,
        changes: &ChangeSet,
        budget: &mut AnnotationBudget,
        log: &mut RunLog,
    ) -> ToolStats {
        let tool = converter.tool();
        let mut stats = ToolStats::new(tool);
        log.step_started(tool, converter.source());

        let found = match converter.convert(self.files).await {
            Ok(found) => found,
            Err(e) => {
                log.conversion_failed(&e);
                return stats;
            }
        };
        stats.found = found.len();

        let mut kept = filter::annotations(found, changes);
        stats.kept = kept.len();
        let dropped = budget.take(&mut kept);
        if dropped > 0 {
            log.record(StepFailure {
                step: "annotation-cap",
                tool: Some(tool),
                path: None,
                message: format!(
                    "{dropped} annotation(s) dropped, report limit of {} reached",
                    self.config.publish.max_annotations
                ),
                status: None,
            });
        }

        if kept.is_empty() {
            tracing::debug!(tool = %tool, "Nothing to publish");
        } else if self.dry_run {
            tracing::info!(tool = %tool, count = kept.len(), "Dry run: would post annotations");
        } else {
            let outcome = post_annotations(
                self.publisher,
                tool,
                &kept,
                self.config.publish.annotation_batch_size,
            )
            .await;
            for (_, error) in &outcome.failures {
                log.publish_failed("post-annotations", Some(tool), error);
            }
            stats.published = outcome.posted;
        }

        log.step_finished(tool, stats.found, stats.kept);
        stats
    }

    async fn cover(&self, converter: &CoverageConverter, changes: &ChangeSet, log: &mut RunLog) -> ToolStats {
        let mut stats = ToolStats::new(Tool::Jacoco);
        log.step_started(Tool::Jacoco, &converter.report_path);

        let report = match converter.convert(self.files) {
            Ok(report) => report,
            Err(e) => {
                log.conversion_failed(&e);
                return stats;
            }
        };
        stats.found = report.files.len();

        let kept = filter::coverage(report, changes);
        stats.kept = kept.files.len();

        if kept.is_empty() {
            tracing::debug!("No coverage for changed files");
        } else if self.dry_run {
            tracing::info!(
                files = kept.files.len(),
                percentage = kept.percentage(),
                "Dry run: would post coverage"
            );
        } else {
            match self.publisher.post_coverage(&kept).await {
                Ok(()) => stats.published = kept.files.len(),
                Err(e) => log.publish_failed("post-coverage", Some(Tool::Jacoco), &e),
            }
        }

        log.step_finished(Tool::Jacoco, stats.found, stats.kept);
        stats
    }
}
