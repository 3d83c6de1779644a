use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Analysis;

#[derive(Debug, Error, Diagnostic)]
pub enum SeqRemoteError {
    #[error("no API key configured")]
    #[diagnostic(help(
        "pass --api-key, set ONE_CODEX_API_KEY, or add \"api_key\" to the config file"
    ))]
    MissingApiKey,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("remote request failed: {0}")]
    RemoteHttp(String),

    #[error("remote service returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("malformed response from remote service: {0}")]
    MalformedResponse(String),

    #[error(
        "timed out after {}s waiting on analyses: {}",
        whole_seconds(.elapsed),
        describe_analyses(.analyses)
    )]
    TimedOut {
        elapsed: Duration,
        analyses: Vec<Analysis>,
    },

    #[error("analyses not finished: {}", describe_analyses(.analyses))]
    AnalysesNotFinished { analyses: Vec<Analysis> },

    #[error("invalid sample path: {0}")]
    InvalidSamplePath(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

fn whole_seconds(elapsed: &Duration) -> u64 {
    elapsed.as_secs()
}

fn describe_analyses(analyses: &[Analysis]) -> String {
    if analyses.is_empty() {
        return "none".to_string();
    }
    analyses
        .iter()
        .map(|analysis| format!("{} ({})", analysis.id, analysis.analysis_status))
        .collect::<Vec<_>>()
        .join(", ")
}
