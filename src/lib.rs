//! Publish static-analysis and coverage results for the files a commit
//! changed to Bitbucket Server Code Insights.
//!
//! Reports from Checkstyle, SpotBugs, PMD, SonarQube and Jacoco are
//! normalized into one finding model, filtered to the commit's change
//! set and posted as a single Code Insights report plus coverage.

pub mod changeset;
pub mod config;
pub mod convert;
pub mod error;
pub mod filter;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod run_log;
pub mod workspace;

pub use changeset::{ChangeSet, ChangedFilesDetector, Git, GitCli, VersionControl};
pub use config::Config;
pub use error::{ChangeSetError, ConfigError, ConversionError, PipelineError, PublishError};
pub use model::{Annotation, CoverageReport, ReportHeader, Severity, Tool};
pub use pipeline::{Pipeline, RunOutcome, RunState};
pub use publish::{BitbucketClient, BitbucketTarget, InsightsPublisher};
pub use workspace::{FileTransfer, LocalWorkspace};
