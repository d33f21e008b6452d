//! Run configuration.
//!
//! Sources, later wins: TOML file, environment (credentials only),
//! command-line flags (applied by `main`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::convert::{SonarAuth, SonarQubeSettings};
use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "code-insights.toml";

/// Largest annotation batch the insights API accepts per request.
pub const MAX_BATCH_SIZE: usize = 1000;

// ── Secret ───────────────────────────────────────────────────────

/// Credential string that never appears in `Debug`/`Display` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

// ── Publish settings ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub report_title: String,
    pub reporter: String,
    pub logo_url: Option<String>,
    /// Annotations per POST request.
    pub annotation_batch_size: usize,
    /// Annotations per report across the whole run.
    pub max_annotations: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            report_title: "Code Insights".into(),
            reporter: "code-insights".into(),
            logo_url: None,
            annotation_batch_size: 100,
            max_annotations: 1000,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl PublishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

// ── Config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bitbucket_url: String,
    pub project: String,
    pub repository: String,
    pub commit_id: String,
    /// Blank disables annotation publishing.
    pub report_key: String,
    pub username: String,
    pub password: Secret,

    /// Local workspace root.
    pub workspace: PathBuf,
    /// Workspace root as the analysis tools saw it, when it differs from
    /// `workspace` (e.g. tools ran inside a container).
    pub analysis_root: Option<String>,
    pub src_path: String,
    pub base_branch: String,
    /// Git metadata directory, relative to the workspace.
    pub git_dir: String,
    /// Copy `git_dir` to a scratch directory before diffing.
    pub isolate_git: bool,

    pub checkstyle_file_path: String,
    pub spotbugs_file_path: String,
    pub pmd_file_path: String,
    /// Blank disables coverage publishing.
    pub jacoco_file_path: String,

    pub sonarqube_url: String,
    pub sonarqube_project_key: String,
    pub sonarqube_token: Secret,
    pub sonarqube_username: String,
    pub sonarqube_password: Secret,

    pub publish: PublishConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bitbucket_url: String::new(),
            project: String::new(),
            repository: String::new(),
            commit_id: String::new(),
            report_key: String::new(),
            username: String::new(),
            password: Secret::default(),
            workspace: PathBuf::from("."),
            analysis_root: None,
            src_path: "src/main/java".into(),
            base_branch: "master".into(),
            git_dir: ".git".into(),
            isolate_git: false,
            checkstyle_file_path: String::new(),
            spotbugs_file_path: String::new(),
            pmd_file_path: String::new(),
            jacoco_file_path: String::new(),
            sonarqube_url: String::new(),
            sonarqube_project_key: String::new(),
            sonarqube_token: Secret::default(),
            sonarqube_username: String::new(),
            sonarqube_password: Secret::default(),
            publish: PublishConfig::default(),
        }
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: origin.to_string(),
            source,
        })
    }

    /// Load the first config file found, or defaults when there is none.
    ///
    /// An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_locations().into_iter().find(|p| p.is_file()),
        };
        let Some(file) = candidate else {
            return Ok(Self::default());
        };

        let origin = file.display().to_string();
        let text = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        tracing::debug!(path = %origin, "Loaded config file");
        Self::from_toml(&text, &origin)
    }

    /// Overlay credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay credentials from `lookup`; blank values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !blank(v));
        if let Some(v) = get("BITBUCKET_USERNAME") {
            self.username = v;
        }
        if let Some(v) = get("BITBUCKET_PASSWORD") {
            self.password = Secret::new(v);
        }
        if let Some(v) = get("SONARQUBE_TOKEN") {
            self.sonarqube_token = Secret::new(v);
        }
        if let Some(v) = get("SONARQUBE_USERNAME") {
            self.sonarqube_username = v;
        }
        if let Some(v) = get("SONARQUBE_PASSWORD") {
            self.sonarqube_password = Secret::new(v);
        }
    }

    /// Check required settings before any network call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("bitbucket_url", self.bitbucket_url.as_str()),
            ("project", self.project.as_str()),
            ("repository", self.repository.as_str()),
            ("commit_id", self.commit_id.as_str()),
            ("username", self.username.as_str()),
        ];
        for (field, value) in required {
            if blank(value) {
                return Err(ConfigError::Missing(field));
            }
        }
        if self.password.is_blank() {
            return Err(ConfigError::Missing("password"));
        }
        check_url("bitbucket_url", &self.bitbucket_url)?;

        if !blank(&self.sonarqube_url) {
            check_url("sonarqube_url", &self.sonarqube_url)?;
            if blank(&self.sonarqube_project_key) {
                return Err(ConfigError::Missing("sonarqube_project_key"));
            }
            let has_basic = !blank(&self.sonarqube_username) && !self.sonarqube_password.is_blank();
            if self.sonarqube_token.is_blank() && !has_basic {
                return Err(ConfigError::Invalid {
                    field: "sonarqube_token",
                    reason: "a token or a username/password pair is required".into(),
                });
            }
        }

        let batch = self.publish.annotation_batch_size;
        if batch == 0 || batch > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid {
                field: "publish.annotation_batch_size",
                reason: format!("must be between 1 and {MAX_BATCH_SIZE}, got {batch}"),
            });
        }
        if self.publish.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "publish.timeout_secs",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Whether annotation publishing is enabled.
    pub fn publishes_annotations(&self) -> bool {
        !blank(&self.report_key)
    }

    /// Root used to relativize absolute paths in Checkstyle/PMD reports.
    pub fn report_root(&self) -> String {
        match &self.analysis_root {
            Some(root) if !blank(root) => root.clone(),
            _ => self.workspace.display().to_string(),
        }
    }

    pub fn sonarqube_settings(&self) -> SonarQubeSettings {
        let auth = if !self.sonarqube_token.is_blank() {
            SonarAuth::Token(self.sonarqube_token.clone())
        } else if !blank(&self.sonarqube_username) {
            SonarAuth::Basic {
                username: self.sonarqube_username.clone(),
                password: self.sonarqube_password.clone(),
            }
        } else {
            SonarAuth::Anonymous
        };
        SonarQubeSettings {
            url: self.sonarqube_url.trim().to_string(),
            project_key: self.sonarqube_project_key.trim().to_string(),
            auth,
            timeout: self.publish.timeout(),
            retry: self.publish.retry_policy(),
        }
    }
}

fn check_url(field: &'static str, url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("`{url}` is not an http(s) URL"),
        })
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "code-insights") {
        locations.push(dirs.config_dir().join("config.toml"));
    }
    locations
}
