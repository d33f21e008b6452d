//! Error taxonomy for an insights run.
//!
//! Fatal errors ([`ChangeSetError`], [`ConfigError`]) abort the whole run
//! through [`PipelineError`]. [`ConversionError`] and [`PublishError`] are
//! isolated: the pipeline records them and moves on to the next tool.

use thiserror::Error;

use crate::model::Tool;

/// Longest response body excerpt carried inside an error.
const BODY_EXCERPT_CHARS: usize = 512;

/// Change-set resolution failed. Always fatal for the run.
#[derive(Error, Debug)]
pub enum ChangeSetError {
    #[error("cannot open repository at {path}: {reason}")]
    Repository { path: String, reason: String },

    #[error("revision `{reference}` does not resolve: {reason}")]
    Revision { reference: String, reason: String },
}

/// Why a converter could not produce findings.
#[derive(Error, Debug)]
pub enum ConversionCause {
    #[error("cannot read report: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("unknown severity token `{0}`")]
    UnknownSeverity(String),

    #[error("missing attribute `{0}`")]
    MissingAttribute(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// A single converter failed. Isolated: other converters still run.
#[derive(Error, Debug)]
#[error("{tool} conversion of {source_path} failed: {cause}")]
pub struct ConversionError {
    pub tool: Tool,
    pub source_path: String,
    #[source]
    pub cause: ConversionCause,
}

impl ConversionError {
    pub fn new(tool: Tool, source_path: impl Into<String>, cause: impl Into<ConversionCause>) -> Self {
        Self {
            tool,
            source_path: source_path.into(),
            cause: cause.into(),
        }
    }
}

/// A call to the insights API failed.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} rejected with HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
}

impl PublishError {
    /// HTTP status of the failed call, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Status { status, .. } => Some(*status),
        }
    }

    /// Timeouts, connection failures, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Status { status, .. } => is_transient_status(*status),
        }
    }
}

/// Configuration is incomplete or inconsistent. Fatal before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that abort a run before anything is published.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot set up converters: {0}")]
    Converters(#[from] ConversionError),
}

pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Shorten a response body for inclusion in an error message.
pub(crate) fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    out.push('…');
    out
}
