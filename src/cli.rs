use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::core::error::LzwError;
use crate::core::job::{Direction, JobSettings, MaxBits};

#[derive(Debug, Parser)]
#[command(name = "lzwflow", version, about = "Control panel for an external LZW compression engine")]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./lzwflow.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Directory holding inputs/, outputs/ and stats/
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
    /// Engine executable
    #[arg(long, global = true, value_name = "PATH")]
    pub engine: Option<PathBuf>,
    /// Kill the engine after this many seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(workspace) = &self.workspace {
            settings.workspace_root = workspace.clone();
        }
        if let Some(engine) = &self.engine {
            settings.engine_path = engine.clone();
        }
        if let Some(secs) = self.timeout_secs {
            settings.engine_timeout_secs = secs;
        }
        if let Some(Commands::Serve(args)) = &self.command {
            if let Some(bind) = &args.bind {
                settings.bind_addr = bind.clone();
            }
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the browser control panel
    Serve(ServeArgs),
    /// Open the terminal control panel
    Tui,
    /// Run a single job on a local file
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(subcommand)]
    pub job: JobCommand,
    /// Copy the resulting artifact here
    #[arg(long, global = true, value_name = "DEST")]
    pub save: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum JobCommand {
    Compress(JobArgs),
    Decompress(JobArgs),
}

#[derive(Debug, Clone, Args)]
pub struct JobArgs {
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
    #[arg(
        long = "max-bits",
        default_value_t = MaxBits::DEFAULT,
        value_parser = clap::value_parser!(u32).range(MaxBits::MIN as i64..=MaxBits::MAX as i64)
    )]
    pub max_bits: u32,
    /// Use a fixed-size code table
    #[arg(long)]
    pub fixed: bool,
    /// Ask the engine for a stats report
    #[arg(long)]
    pub stats: bool,
}

impl JobCommand {
    pub fn direction(&self) -> Direction {
        match self {
            JobCommand::Compress(_) => Direction::Compress,
            JobCommand::Decompress(_) => Direction::Decompress,
        }
    }

    pub fn args(&self) -> &JobArgs {
        match self {
            JobCommand::Compress(args) | JobCommand::Decompress(args) => args,
        }
    }

    pub fn settings(&self) -> Result<JobSettings, LzwError> {
        self.args().settings(self.direction())
    }
}

impl JobArgs {
    pub fn settings(&self, direction: Direction) -> Result<JobSettings, LzwError> {
        Ok(JobSettings {
            direction,
            max_bits: MaxBits::new(self.max_bits)?,
            fixed_table: self.fixed,
            collect_stats: self.stats,
        })
    }
}

/// Commands typed into the terminal panel.
#[derive(Debug, Parser)]
#[command(name = "lzwflow", no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
pub struct PanelCli {
    #[command(subcommand)]
    pub command: PanelCommand,
}

#[derive(Debug, Subcommand)]
pub enum PanelCommand {
    Compress(JobArgs),
    Decompress(JobArgs),
    /// Copy the last artifact to DEST
    Save {
        #[arg(value_name = "DEST")]
        dest: PathBuf,
    },
    /// Print the last stats report
    Stats,
    /// Print the last result
    Result,
}

pub fn parse_line(line: &str) -> Result<PanelCommand, String> {
    let tokens = shell_words::split(line).map_err(|err| err.to_string())?;
    let parsed = PanelCli::try_parse_from(tokens).map_err(|err| err.to_string())?;
    Ok(parsed.command)
}

pub const PANEL_HELP: [&str; 8] = [
    "Commands:",
    "  compress <file> [--max-bits 9..16] [--fixed] [--stats]",
    "  decompress <file.lzw> [--max-bits 9..16] [--fixed] [--stats]",
    "  save <dest>      copy the last artifact",
    "  stats            show the last stats report",
    "  result           show the last result",
    "  clear / exit",
    "Keys: PgUp/PgDn/Up/Down/Home/End scroll, Esc quits",
];
