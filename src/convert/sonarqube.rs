//! SonarQube issue source.
//!
//! Unlike the file-based converters this one queries the SonarQube Web
//! API (`api/issues/search`) for the project's open issues. Issue
//! components are `projectKey:relative/path`, already repository-relative.

use std::time::Duration;

use serde::Deserialize;

use crate::config::Secret;
use crate::error::{body_excerpt, ConversionCause};
use crate::model::{Annotation, AnnotationKind, Severity, Tool};
use crate::paths::normalize_rel_path;
use crate::retry::RetryPolicy;

/// Issues per page; the API maximum.
const PAGE_SIZE: u32 = 500;

/// The API refuses to page past 10 000 results.
const MAX_PAGES: u32 = 20;

/// Credentials for the SonarQube Web API.
#[derive(Debug, Clone)]
pub enum SonarAuth {
    /// User token, sent as the basic-auth user with an empty password.
    Token(Secret),
    Basic { username: String, password: Secret },
    Anonymous,
}

/// Connection settings for a SonarQube server.
#[derive(Debug, Clone)]
pub struct SonarQubeSettings {
    pub url: String,
    pub project_key: String,
    pub auth: SonarAuth,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    paging: Paging,
    #[serde(default)]
    issues: Vec<IssueJson>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(rename = "pageIndex")]
    page_index: u32,
    #[serde(rename = "pageSize")]
    page_size: u32,
    total: u32,
}

#[derive(Debug, Deserialize)]
struct IssueJson {
    component: String,
    line: Option<u32>,
    #[serde(default)]
    message: String,
    severity: String,
    #[serde(rename = "type")]
    issue_type: Option<String>,
    rule: Option<String>,
}

/// Queries one project's unresolved issues.
#[derive(Debug, Clone)]
pub struct SonarQubeSource {
    settings: SonarQubeSettings,
    http: reqwest::Client,
}

impl SonarQubeSource {
    pub fn new(settings: SonarQubeSettings) -> Result<Self, ConversionCause> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &SonarQubeSettings {
        &self.settings
    }

    fn search_url(&self) -> String {
        format!("{}/api/issues/search", self.settings.url.trim_end_matches('/'))
    }

    async fn fetch_page(&self, page: u32) -> Result<SearchResponse, ConversionCause> {
        let page_size = PAGE_SIZE.to_string();
        let page_number = page.to_string();
        let mut request = self.http.get(self.search_url()).query(&[
            ("componentKeys", self.settings.project_key.as_str()),
            ("resolved", "false"),
            ("ps", page_size.as_str()),
            ("p", page_number.as_str()),
        ]);
        request = match &self.settings.auth {
            SonarAuth::Token(token) => request.basic_auth(token.expose(), Some("")),
            SonarAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose()))
            }
            SonarAuth::Anonymous => request,
        };

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ConversionCause::Status {
                status,
                body: body_excerpt(&body),
            });
        }
        Ok(resp.json().await?)
    }

    /// Fetch every unresolved issue, following pagination.
    pub async fn fetch(&self) -> Result<Vec<Annotation>, ConversionCause> {
        let mut annotations = Vec::new();
        let mut page = 1;
        loop {
            let response = self
                .settings
                .retry
                .run("sonarqube issues", || self.fetch_page(page))
                .await?;
            tracing::debug!(
                page,
                issues = response.issues.len(),
                total = response.paging.total,
                "Fetched SonarQube issues"
            );
            for issue in response.issues {
                if let Some(annotation) = issue_to_annotation(issue)? {
                    annotations.push(annotation);
                }
            }

            let seen = response.paging.page_index.saturating_mul(response.paging.page_size);
            if seen >= response.paging.total {
                break;
            }
            if page >= MAX_PAGES {
                tracing::warn!(
                    total = response.paging.total,
                    fetched = annotations.len(),
                    pages = MAX_PAGES,
                    "SonarQube paging limit reached, remaining issues are not published"
                );
                break;
            }
            page += 1;
        }
        Ok(annotations)
    }
}

fn severity(token: &str) -> Result<Severity, ConversionCause> {
    match token.trim() {
        "BLOCKER" | "CRITICAL" => Ok(Severity::High),
        "MAJOR" => Ok(Severity::Medium),
        "MINOR" | "INFO" => Ok(Severity::Low),
        other => Err(ConversionCause::UnknownSeverity(other.to_string())),
    }
}

fn kind(issue_type: Option<&str>) -> Option<AnnotationKind> {
    match issue_type? {
        "BUG" => Some(AnnotationKind::Bug),
        "VULNERABILITY" | "SECURITY_HOTSPOT" => Some(AnnotationKind::Vulnerability),
        "CODE_SMELL" => Some(AnnotationKind::CodeSmell),
        _ => None,
    }
}

/// Project-level issues (no file part in the component) are skipped.
fn issue_to_annotation(issue: IssueJson) -> Result<Option<Annotation>, ConversionCause> {
    let Some((_, path)) = issue.component.split_once(':') else {
        return Ok(None);
    };
    let path = normalize_rel_path(path);
    if path.is_empty() {
        return Ok(None);
    }
    let message = match issue.rule.as_deref() {
        Some(rule) => format!("{} ({})", issue.message.trim(), rule),
        None => issue.message.trim().to_string(),
    };
    Ok(Some(Annotation {
        path,
        line: issue.line.unwrap_or(0),
        message,
        severity: severity(&issue.severity)?,
        kind: kind(issue.issue_type.as_deref()),
        tool: Tool::SonarQube,
    }))
}
