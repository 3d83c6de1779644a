use std::fmt;

use serde::{Deserialize, Serialize};

/// A sample as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub filename: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnalysisStatus {
    Pending,
    Success,
    Failure,
    Other(String),
}

impl AnalysisStatus {
    /// Anything the service reports other than `Pending` is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisStatus::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AnalysisStatus::Pending => "Pending",
            AnalysisStatus::Success => "Success",
            AnalysisStatus::Failure => "Failure",
            AnalysisStatus::Other(value) => value,
        }
    }
}

impl From<String> for AnalysisStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => AnalysisStatus::Pending,
            "Success" => AnalysisStatus::Success,
            "Failure" => AnalysisStatus::Failure,
            _ => AnalysisStatus::Other(value),
        }
    }
}

impl From<AnalysisStatus> for String {
    fn from(value: AnalysisStatus) -> Self {
        match value {
            AnalysisStatus::Other(value) => value,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One run of a sample against one reference database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub sample_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_name: Option<String>,
    pub analysis_status: AnalysisStatus,
}

impl Analysis {
    pub fn is_success(&self) -> bool {
        self.analysis_status == AnalysisStatus::Success
    }

    pub fn artifact_base_name(&self) -> String {
        derive_artifact_base_name(self)
    }

    pub fn artifact_file_name(&self, kind: ArtifactKind) -> String {
        kind.file_name(&self.artifact_base_name())
    }
}

/// True when no analysis is still pending. An empty slice counts as finished.
pub fn all_terminal(analyses: &[Analysis]) -> bool {
    analyses
        .iter()
        .all(|analysis| analysis.analysis_status.is_terminal())
}

/// `<sample name without extension>_ref_<reference id>`, where a trailing
/// `.gz` takes the extension before it along.
pub fn derive_artifact_base_name(analysis: &Analysis) -> String {
    let (mut stem, ext) = split_extension(&analysis.sample_filename);
    if ext == ".gz" {
        stem = split_extension(stem).0;
    }
    format!("{stem}_ref_{}", analysis.reference_id)
}

// Leading dots belong to the name, not the extension.
fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(index) => name.split_at(leading + index),
        None => (name, ""),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Summary,
    Table,
    Raw,
}

impl ArtifactKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Summary => "_summary.json",
            ArtifactKind::Table => ".json",
            ArtifactKind::Raw => ".tsv.gz",
        }
    }

    pub fn file_name(self, base: &str) -> String {
        format!("{base}{}", self.suffix())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Summary => write!(f, "summary"),
            ArtifactKind::Table => write!(f, "table"),
            ArtifactKind::Raw => write!(f, "raw"),
        }
    }
}

/// JSON documents the service serves per analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Summary,
    Table,
}
