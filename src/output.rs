use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::AnalysisStatus;
use crate::workflow::{ProgressEvent, ProgressSink, RetrievedAnalysis, SampleRetrieval};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadCheck {
    pub path: PathBuf,
    pub id: Option<String>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_upload_checks(checks: &[UploadCheck]) -> io::Result<()> {
        Self::print_json(&checks)
    }

    pub fn print_assign(results: &[RetrievedAnalysis]) -> io::Result<()> {
        Self::print_json(&results)
    }

    pub fn print_retrieve(results: &[SampleRetrieval]) -> io::Result<()> {
        Self::print_json(&results)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable progress on stderr.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>6}s] {}", elapsed.as_secs(), event.message),
            None => eprintln!("{}", event.message),
        }
    }
}

impl ConsoleOutput {
    pub fn print_upload_checks(checks: &[UploadCheck]) {
        for check in checks {
            let id = check.id.as_deref().unwrap_or("-");
            println!("{}\t{id}", check.path.display());
        }
    }

    pub fn print_analyses(results: &[RetrievedAnalysis]) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        println!("{cyan}seqremote: {} analyses retrieved{reset}", results.len());
        for result in results {
            let color = if result.analysis_status == AnalysisStatus::Success {
                green
            } else {
                yellow
            };
            println!(
                "{color}{} ref {} ({}){reset}",
                result.analysis_id, result.reference_id, result.analysis_status
            );
            println!("   summary: {}", result.paths.summary_path);
            if let Some(path) = &result.paths.table_path {
                println!("   table:   {path}");
            }
            if let Some(path) = &result.paths.raw_path {
                println!("   raw:     {path}");
            }
        }
    }

    pub fn print_retrieve(results: &[SampleRetrieval]) {
        for sample in results {
            println!("{}", sample.sample_filename);
            Self::print_analyses(&sample.analyses);
        }
    }
}
