use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use seqremote::client::OneCodexHttpClient;
use seqremote::config::{API_KEY_ENV, ConfigLoader, ConfigOverrides, ResolvedConfig};
use seqremote::error::SeqRemoteError;
use seqremote::fs_util;
use seqremote::output::{ConsoleOutput, JsonOutput, OutputMode, UploadCheck};
use seqremote::table::{convert_json_to_table, parse_table_document, write_tsv};
use seqremote::workflow::{AssignOptions, ProgressSink, Workflow, WorkflowOptions};

#[derive(Parser)]
#[command(name = "seqremote")]
#[command(about = "Process sequence data remotely on One Codex")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// API key; falls back to ONE_CODEX_API_KEY, then the config file
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Upload a sample file and print its remote id")]
    Upload(UploadArgs),
    #[command(about = "Check which local files have a matching remote sample")]
    CheckUpload(CheckUploadArgs),
    #[command(about = "Upload a sample, wait for its analyses and download the results")]
    Assign(AssignArgs),
    #[command(about = "Download results for samples uploaded earlier")]
    Retrieve(RetrieveArgs),
    #[command(about = "Convert a JSON analysis table to tab-separated text")]
    Convert(ConvertArgs),
}

#[derive(Args)]
struct UploadArgs {
    input_file: PathBuf,
}

#[derive(Args)]
struct CheckUploadArgs {
    #[arg(required = true)]
    input_files: Vec<PathBuf>,
}

#[derive(Args)]
struct AssignArgs {
    input_file: PathBuf,
    output_dir: PathBuf,

    /// Write the per-analysis summaries to this file as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Seconds between polls
    #[arg(long, default_value_t = 100)]
    sleep: u64,

    /// Seconds before giving up on pending analyses
    #[arg(long, default_value_t = 86400)]
    timeout: u64,

    #[arg(long)]
    no_raw: bool,
}

#[derive(Args)]
struct RetrieveArgs {
    output_dir: PathBuf,

    #[arg(required = true)]
    input_files: Vec<PathBuf>,

    #[arg(long)]
    no_raw: bool,
}

#[derive(Args)]
struct ConvertArgs {
    input_json: PathBuf,
    output_tsv: Option<PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SeqRemoteError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SeqRemoteError) -> u8 {
    match error {
        SeqRemoteError::MissingApiKey
        | SeqRemoteError::ConfigRead(_)
        | SeqRemoteError::ConfigParse(_) => 2,
        SeqRemoteError::RemoteHttp(_)
        | SeqRemoteError::RemoteStatus { .. }
        | SeqRemoteError::MalformedResponse(_) => 3,
        SeqRemoteError::TimedOut { .. } => 4,
        SeqRemoteError::AnalysesNotFinished { .. } => 5,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let command = match cli.command {
        Commands::Convert(args) => return run_convert(args),
        command => command,
    };

    let resolved = ConfigLoader::resolve(
        cli.config.as_deref(),
        ConfigOverrides {
            api_key: cli.api_key,
            env_api_key: std::env::var(API_KEY_ENV).ok(),
        },
    )?;
    let workflow = build_workflow(&resolved)?;

    match command {
        Commands::Upload(args) => run_upload(args, &workflow, output_mode),
        Commands::CheckUpload(args) => run_check_upload(args, &workflow, output_mode),
        Commands::Assign(args) => run_assign(args, &workflow, output_mode),
        Commands::Retrieve(args) => run_retrieve(args, &workflow, output_mode),
        Commands::Convert(args) => run_convert(args),
    }
}

fn build_workflow(resolved: &ResolvedConfig) -> miette::Result<Workflow<OneCodexHttpClient>> {
    let client = OneCodexHttpClient::new(&resolved.client)?;
    Ok(Workflow::new(
        client,
        WorkflowOptions {
            registration_wait: resolved.registration_wait,
            compress_uploads: true,
        },
    ))
}

fn sink_for(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &ConsoleOutput,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn run_upload(
    args: UploadArgs,
    workflow: &Workflow<OneCodexHttpClient>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let id = workflow.upload_sample(&args.input_file)?;
    let check = UploadCheck {
        path: args.input_file,
        id,
    };
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_json(&check).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_upload_checks(&[check]),
    }
    Ok(())
}

fn run_check_upload(
    args: CheckUploadArgs,
    workflow: &Workflow<OneCodexHttpClient>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let ids = workflow.resolve_sample_identifiers(&args.input_files)?;
    let checks: Vec<UploadCheck> = args
        .input_files
        .into_iter()
        .zip(ids)
        .map(|(path, id)| UploadCheck { path, id })
        .collect();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_upload_checks(&checks).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_upload_checks(&checks),
    }
    Ok(())
}

fn run_assign(
    args: AssignArgs,
    workflow: &Workflow<OneCodexHttpClient>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let options = AssignOptions {
        poll_interval: Duration::from_secs(args.sleep),
        timeout: Duration::from_secs(args.timeout),
        include_raw: !args.no_raw,
    };
    let results = workflow.assign_sample(
        &args.input_file,
        &args.output_dir,
        &options,
        sink_for(output_mode),
    )?;

    if let Some(summary) = &args.summary {
        fs_util::write_json_atomic(summary, &results)?;
    }
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_assign(&results).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_analyses(&results),
    }
    Ok(())
}

fn run_retrieve(
    args: RetrieveArgs,
    workflow: &Workflow<OneCodexHttpClient>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let results = workflow.retrieve_samples(
        &args.input_files,
        &args.output_dir,
        !args.no_raw,
        sink_for(output_mode),
    )?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_retrieve(&results).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_retrieve(&results),
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> miette::Result<()> {
    let content = std::fs::read_to_string(&args.input_json).into_diagnostic()?;
    let records = parse_table_document(&content)?;
    let rows = convert_json_to_table(&records)?;
    match args.output_tsv {
        Some(path) => {
            let file = File::create(&path).into_diagnostic()?;
            write_tsv(&rows, BufWriter::new(file)).into_diagnostic()?;
        }
        None => write_tsv(&rows, io::stdout().lock()).into_diagnostic()?,
    }
    Ok(())
}
