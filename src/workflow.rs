use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::RemoteClient;
use crate::domain::{Analysis, AnalysisStatus, ArtifactKind, JsonKind, all_terminal};
use crate::error::SeqRemoteError;
use crate::fs_util;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
    Uploading,
    AwaitingRegistration,
    Polling,
    AllTerminal,
    Retrieving,
    Done,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Pause between upload and the sample lookup.
    pub registration_wait: Duration,
    pub compress_uploads: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            registration_wait: Duration::from_secs(10),
            compress_uploads: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub include_raw: bool,
}

impl Default for AssignOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(100),
            timeout: Duration::from_secs(86400),
            include_raw: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedSample {
    pub local_path: PathBuf,
    pub file_name: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub summary_path: Utf8PathBuf,
    pub table_path: Option<Utf8PathBuf>,
    pub raw_path: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedAnalysis {
    pub analysis_id: String,
    pub sample_filename: String,
    pub reference_id: String,
    pub analysis_status: AnalysisStatus,
    pub summary: Value,
    #[serde(flatten)]
    pub paths: ArtifactPaths,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleRetrieval {
    pub local_path: PathBuf,
    pub sample_filename: String,
    pub analyses: Vec<RetrievedAnalysis>,
}

pub struct Workflow<C: RemoteClient> {
    client: C,
    options: WorkflowOptions,
}

impl<C: RemoteClient> Workflow<C> {
    pub fn new(client: C, options: WorkflowOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Upload a sample and look up the identifier the service gave it.
    pub fn upload_sample(&self, path: &Path) -> Result<Option<String>, SeqRemoteError> {
        Ok(self.upload(path)?.id)
    }

    pub fn upload(&self, path: &Path) -> Result<UploadedSample, SeqRemoteError> {
        let file_name = self.remote_file_name(path)?;
        let (compressed, upload_path) = if self.options.compress_uploads {
            fs_util::gzip_if_needed(path)?
        } else {
            (false, path.to_path_buf())
        };

        info!(sample = %file_name, "uploading sample");
        let uploaded = self.client.upload(&upload_path);
        if compressed {
            fs_util::remove_file(&upload_path)?;
        }
        uploaded?;

        if !self.options.registration_wait.is_zero() {
            debug!(wait = ?self.options.registration_wait, "waiting for sample registration");
            thread::sleep(self.options.registration_wait);
        }

        let samples = self.client.list_samples()?;
        let id = samples
            .into_iter()
            .find(|sample| sample.filename == file_name)
            .map(|sample| sample.id);
        if id.is_none() {
            warn!(sample = %file_name, "uploaded sample not listed yet");
        }

        Ok(UploadedSample {
            local_path: path.to_path_buf(),
            file_name,
            id,
        })
    }

    pub fn resolve_sample_identifiers(
        &self,
        paths: &[PathBuf],
    ) -> Result<Vec<Option<String>>, SeqRemoteError> {
        let samples = self.client.list_samples()?;
        let mut by_name = HashMap::with_capacity(samples.len());
        for sample in samples {
            if let Some(previous) = by_name.insert(sample.filename.clone(), sample.id.clone()) {
                warn!(
                    filename = %sample.filename,
                    previous = %previous,
                    kept = %sample.id,
                    "duplicate sample file name on remote service"
                );
            }
        }

        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            ids.push(by_name.get(&self.remote_file_name(path)?).cloned());
        }
        Ok(ids)
    }

    /// Name the service knows a local file by: the gzipped name when uploads
    /// are compressed.
    pub fn remote_file_name(&self, path: &Path) -> Result<String, SeqRemoteError> {
        let name = file_name_of(path)?;
        if self.options.compress_uploads && !name.ends_with(".gz") {
            Ok(format!("{name}.gz"))
        } else {
            Ok(name)
        }
    }

    pub fn list_analyses_for_sample(
        &self,
        sample_file_name: &str,
    ) -> Result<Vec<Analysis>, SeqRemoteError> {
        Ok(self
            .client
            .list_analyses()?
            .into_iter()
            .filter(|analysis| analysis.sample_filename == sample_file_name)
            .collect())
    }

    pub fn retrieve_artifacts(
        &self,
        analysis: &Analysis,
        output_dir: &Path,
        include_raw: bool,
    ) -> Result<RetrievedAnalysis, SeqRemoteError> {
        let base = analysis.artifact_base_name();
        debug!(analysis = %analysis.id, base = %base, "retrieving artifacts");

        let summary = self.client.fetch_json(&analysis.id, JsonKind::Summary)?;
        let summary_path = output_path(output_dir, ArtifactKind::Summary, &base)?;
        fs_util::write_json_atomic(summary_path.as_std_path(), &summary)?;

        let mut table_path = None;
        let mut raw_path = None;
        if analysis.is_success() {
            let table = self.client.fetch_json(&analysis.id, JsonKind::Table)?;
            let path = output_path(output_dir, ArtifactKind::Table, &base)?;
            fs_util::write_json_atomic(path.as_std_path(), &table)?;
            table_path = Some(path);

            if include_raw {
                let path = output_path(output_dir, ArtifactKind::Raw, &base)?;
                let temp = fs_util::temp_file_in(output_dir)?;
                self.client.download_raw(&analysis.id, temp.path())?;
                fs_util::persist(temp, path.as_std_path())?;
                raw_path = Some(path);
            }
        }

        Ok(RetrievedAnalysis {
            analysis_id: analysis.id.clone(),
            sample_filename: analysis.sample_filename.clone(),
            reference_id: analysis.reference_id.clone(),
            analysis_status: analysis.analysis_status.clone(),
            summary,
            paths: ArtifactPaths {
                summary_path,
                table_path,
                raw_path,
            },
            retrieved_at: Utc::now(),
        })
    }

    /// Refuses to touch anything unless every analysis is finished.
    pub fn retrieve_all(
        &self,
        analyses: &[Analysis],
        output_dir: &Path,
        include_raw: bool,
    ) -> Result<Vec<RetrievedAnalysis>, SeqRemoteError> {
        if !all_terminal(analyses) {
            return Err(SeqRemoteError::AnalysesNotFinished {
                analyses: analyses.to_vec(),
            });
        }
        analyses
            .iter()
            .map(|analysis| self.retrieve_artifacts(analysis, output_dir, include_raw))
            .collect()
    }

    /// Upload, wait for every analysis of the sample to finish, then
    /// download their results into `output_dir`.
    ///
    /// The first poll happens after `registration_wait` plus one `poll_interval`.
    pub fn assign_sample(
        &self,
        path: &Path,
        output_dir: &Path,
        options: &AssignOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<RetrievedAnalysis>, SeqRemoteError> {
        let started = Instant::now();
        let mut state = WorkflowState::Uploading;
        let mut file_name = String::new();
        let mut analyses = Vec::new();
        let mut results = Vec::new();

        loop {
            report(sink, state, started, &analyses);
            state = match state {
                WorkflowState::Uploading => {
                    let uploaded = self.upload(path)?;
                    file_name = uploaded.file_name;
                    WorkflowState::AwaitingRegistration
                }
                WorkflowState::AwaitingRegistration => {
                    thread::sleep(options.poll_interval);
                    WorkflowState::Polling
                }
                WorkflowState::Polling => {
                    analyses = self.list_analyses_for_sample(&file_name)?;
                    if all_terminal(&analyses) {
                        if analyses.is_empty() {
                            warn!(sample = %file_name, "no analyses found; nothing to retrieve");
                        }
                        WorkflowState::AllTerminal
                    } else if started.elapsed() >= options.timeout {
                        WorkflowState::TimedOut
                    } else {
                        thread::sleep(options.poll_interval);
                        WorkflowState::Polling
                    }
                }
                WorkflowState::AllTerminal => WorkflowState::Retrieving,
                WorkflowState::Retrieving => {
                    results = self.retrieve_all(&analyses, output_dir, options.include_raw)?;
                    WorkflowState::Done
                }
                WorkflowState::Done => return Ok(results),
                WorkflowState::TimedOut => {
                    return Err(SeqRemoteError::TimedOut {
                        elapsed: started.elapsed(),
                        analyses,
                    });
                }
            };
        }
    }

    /// Collect results for samples uploaded earlier.
    pub fn retrieve_samples(
        &self,
        paths: &[PathBuf],
        output_dir: &Path,
        include_raw: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<SampleRetrieval>, SeqRemoteError> {
        let mut retrievals = Vec::with_capacity(paths.len());
        for path in paths {
            let sample_filename = self.remote_file_name(path)?;
            sink.event(ProgressEvent {
                message: format!("retrieving {sample_filename}"),
                elapsed: None,
            });
            let analyses = self.list_analyses_for_sample(&sample_filename)?;
            if analyses.is_empty() {
                warn!(sample = %sample_filename, "no analyses found");
            }
            let retrieved = self.retrieve_all(&analyses, output_dir, include_raw)?;
            retrievals.push(SampleRetrieval {
                local_path: path.clone(),
                sample_filename,
                analyses: retrieved,
            });
        }
        Ok(retrievals)
    }
}

fn report(sink: &dyn ProgressSink, state: WorkflowState, started: Instant, analyses: &[Analysis]) {
    let elapsed = started.elapsed();
    let pending = analyses
        .iter()
        .filter(|analysis| !analysis.analysis_status.is_terminal())
        .count();
    info!(state = ?state, elapsed_secs = elapsed.as_secs(), pending, "workflow state");
    sink.event(ProgressEvent {
        message: format!(
            "state={state:?}; analyses={}; pending={pending}",
            analyses.len()
        ),
        elapsed: Some(elapsed),
    });
}

fn file_name_of(path: &Path) -> Result<String, SeqRemoteError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| SeqRemoteError::InvalidSamplePath(path.display().to_string()))
}

fn output_path(
    output_dir: &Path,
    kind: ArtifactKind,
    base: &str,
) -> Result<Utf8PathBuf, SeqRemoteError> {
    Utf8PathBuf::from_path_buf(output_dir.join(kind.file_name(base)))
        .map_err(|path| SeqRemoteError::Filesystem(format!("non-utf8 path {}", path.display())))
}
