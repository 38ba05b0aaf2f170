use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lzwflow::cli::{Cli, Commands, RunArgs};
use lzwflow::config::{self, Settings};
use lzwflow::core::{self, cache::JobResultCache, formatter::format_result_lines, job::Upload};
use lzwflow::core::error::LzwError;
use lzwflow::core::runner::ProcessEngine;
use lzwflow::core::workspace::Workspace;
use lzwflow::{tui, web};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);

    match cli.command {
        None => {
            init_logging(&settings, None)?;
            serve(&settings)
        }
        Some(Commands::Serve(_)) => {
            init_logging(&settings, None)?;
            serve(&settings)
        }
        Some(Commands::Tui) => {
            let workspace = Workspace::new(&settings.workspace_root);
            workspace.ensure_all()?;
            init_logging(&settings, Some(&workspace))?;
            tui::run(workspace, Arc::new(engine(&settings)))?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Run(args)) => {
            init_logging(&settings, None)?;
            run_once(&settings, args)
        }
    }
}

fn serve(settings: &Settings) -> anyhow::Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(web::serve(settings))?;
    Ok(ExitCode::SUCCESS)
}

fn run_once(settings: &Settings, args: RunArgs) -> anyhow::Result<ExitCode> {
    let workspace = Workspace::new(&settings.workspace_root);
    let engine = engine(settings);
    let job_settings = args.job.settings()?;
    let upload = args
        .job
        .args()
        .file
        .as_deref()
        .map(Upload::from_path)
        .transpose()?;

    let mut cache = JobResultCache::new();
    let result = match core::submit(&mut cache, &workspace, &engine, upload, job_settings) {
        Ok(result) => result.clone(),
        Err(LzwError::MissingInput) => {
            eprintln!("warning: please supply a file.");
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err.into()),
    };

    for line in format_result_lines(&result) {
        println!("{line}");
    }
    if !result.succeeded {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(report) = cache.read_stats()? {
        println!();
        println!("{}", report.text());
    }
    if let Some(dest) = &args.save {
        match cache.save_artifact(dest)? {
            Some(path) => println!("Saved to {}", path.display()),
            None => eprintln!("warning: nothing to save"),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn engine(settings: &Settings) -> ProcessEngine {
    ProcessEngine::new(&settings.engine_path).with_timeout(settings.engine_timeout())
}

/// Logs go to stderr, except under the terminal panel where they would
/// corrupt the screen; there they are appended to `<workspace>/lzwflow.log`.
fn init_logging(settings: &Settings, log_dir: Option<&Workspace>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;

    match log_dir {
        Some(workspace) => {
            let path = workspace.root().join("lzwflow.log");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
