//! Publishing to the Bitbucket Code Insights API.
//!
//! Three calls per run, in order:
//!
//! 1. `PUT  .../commits/{commit}/reports/{key}` upserts the report header
//! 2. `POST .../reports/{key}/annotations` once per batch, per tool
//! 3. `POST /rest/code-coverage/1.0/commits/{commit}` with filtered coverage
//!
//! The header upsert and the coverage post are idempotent and retried on
//! transient failures. Annotation posts are not: a retried POST whose
//! first attempt reached the server would duplicate annotations.

pub mod payload;

use async_trait::async_trait;

use crate::config::{Config, Secret};
use crate::error::{body_excerpt, PublishError};
use crate::model::{Annotation, CoverageReport, ReportHeader, Tool};
use crate::retry::RetryPolicy;

use payload::{AnnotationsBody, CoverageBody, ReportBody};

// ── Publisher seam ───────────────────────────────────────────────

/// Remote insights API.
#[async_trait]
pub trait InsightsPublisher: Send + Sync {
    /// Create or overwrite the report header.
    async fn put_report(&self, header: &ReportHeader) -> Result<(), PublishError>;

    /// Post one batch of annotations; `batch` is within the API limit.
    async fn post_annotation_batch(&self, tool: Tool, batch: &[Annotation]) -> Result<(), PublishError>;

    /// Post per-file coverage for the commit.
    async fn post_coverage(&self, coverage: &CoverageReport) -> Result<(), PublishError>;
}

// ── Batching ─────────────────────────────────────────────────────

/// Result of posting one tool's annotations.
#[derive(Debug, Default)]
pub struct AnnotationOutcome {
    pub batches: usize,
    pub posted: usize,
    /// Failed batches by 0-based index.
    pub failures: Vec<(usize, PublishError)>,
}

/// Post `annotations` in order, `batch_size` at a time.
///
/// A failed batch is recorded and the remaining batches are still sent.
pub async fn post_annotations(
    publisher: &dyn InsightsPublisher,
    tool: Tool,
    annotations: &[Annotation],
    batch_size: usize,
) -> AnnotationOutcome {
    let mut outcome = AnnotationOutcome::default();
    for (index, batch) in annotations.chunks(batch_size.max(1)).enumerate() {
        outcome.batches += 1;
        match publisher.post_annotation_batch(tool, batch).await {
            Ok(()) => outcome.posted += batch.len(),
            Err(e) => {
                tracing::warn!(
                    tool = %tool,
                    batch = index,
                    size = batch.len(),
                    status = e.status(),
                    error = %e,
                    "Annotation batch failed"
                );
                outcome.failures.push((index, e));
            }
        }
    }
    outcome
}

/// Per-report annotation cap shared by every tool of a run.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationBudget {
    remaining: usize,
}

impl AnnotationBudget {
    pub fn new(limit: usize) -> Self {
        Self { remaining: limit }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Keep as many annotations as the budget allows, in order.
    /// Returns the number dropped.
    pub fn take(&mut self, annotations: &mut Vec<Annotation>) -> usize {
        let keep = annotations.len().min(self.remaining);
        let dropped = annotations.len() - keep;
        annotations.truncate(keep);
        self.remaining -= keep;
        dropped
    }
}

// ── Bitbucket client ─────────────────────────────────────────────

/// Where a run publishes: one report on one commit.
#[derive(Debug, Clone)]
pub struct BitbucketTarget {
    pub base_url: String,
    pub project: String,
    pub repository: String,
    pub commit_id: String,
    pub report_key: String,
    pub username: String,
    pub password: Secret,
}

impl BitbucketTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.bitbucket_url.trim().trim_end_matches('/').to_string(),
            project: config.project.trim().to_string(),
            repository: config.repository.trim().to_string(),
            commit_id: config.commit_id.trim().to_string(),
            report_key: config.report_key.trim().to_string(),
            username: config.username.trim().to_string(),
            password: config.password.clone(),
        }
    }
}

/// HTTP client for Bitbucket Server Code Insights.
pub struct BitbucketClient {
    target: BitbucketTarget,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl BitbucketClient {
    pub fn new(
        target: BitbucketTarget,
        timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| PublishError::Transport {
                operation: "client setup",
                source,
            })?;
        Ok(Self { target, http, retry })
    }

    fn report_url(&self) -> String {
        let t = &self.target;
        format!(
            "{}/rest/insights/1.0/projects/{}/repos/{}/commits/{}/reports/{}",
            t.base_url,
            urlencoding::encode(&t.project),
            urlencoding::encode(&t.repository),
            urlencoding::encode(&t.commit_id),
            urlencoding::encode(&t.report_key),
        )
    }

    fn annotations_url(&self) -> String {
        format!("{}/annotations", self.report_url())
    }

    fn coverage_url(&self) -> String {
        format!(
            "{}/rest/code-coverage/1.0/commits/{}",
            self.target.base_url,
            urlencoding::encode(&self.target.commit_id),
        )
    }

    /// Send an authenticated JSON request and check the status.
    async fn send_json<B: serde::Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: reqwest::Method,
        url: &str,
        body: &B,
    ) -> Result<(), PublishError> {
        tracing::debug!(operation, %method, url, "Sending request");
        let resp = self
            .http
            .request(method, url)
            .basic_auth(&self.target.username, Some(self.target.password.expose()))
            .json(body)
            .send()
            .await
            .map_err(|source| PublishError::Transport { operation, source })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PublishError::Status {
            operation,
            status: status.as_u16(),
            body: body_excerpt(&body),
        })
    }
}

#[async_trait]
impl InsightsPublisher for BitbucketClient {
    async fn put_report(&self, header: &ReportHeader) -> Result<(), PublishError> {
        let url = self.report_url();
        let body = ReportBody::from(header);
        self.retry
            .run("put report", || {
                self.send_json("put report", reqwest::Method::PUT, &url, &body)
            })
            .await?;
        tracing::info!(report_key = %self.target.report_key, "Report registered");
        Ok(())
    }

    async fn post_annotation_batch(&self, tool: Tool, batch: &[Annotation]) -> Result<(), PublishError> {
        let body = AnnotationsBody::new(batch);
        self.send_json(
            "post annotations",
            reqwest::Method::POST,
            &self.annotations_url(),
            &body,
        )
        .await?;
        tracing::debug!(tool = %tool, count = batch.len(), "Annotation batch posted");
        Ok(())
    }

    async fn post_coverage(&self, coverage: &CoverageReport) -> Result<(), PublishError> {
        let url = self.coverage_url();
        let body = CoverageBody::new(&coverage.files);
        self.retry
            .run("post coverage", || {
                self.send_json("post coverage", reqwest::Method::POST, &url, &body)
            })
            .await?;
        tracing::info!(
            files = coverage.files.len(),
            covered = coverage.lines_covered(),
            total = coverage.lines_total(),
            "Coverage posted"
        );
        Ok(())
    }
}
