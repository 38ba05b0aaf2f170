use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LzwError {
    #[error("no file was supplied")]
    MissingInput,
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },
    #[error("'{filename}' does not end in .lzw and cannot be decompressed")]
    UnrecognizedSuffix { filename: String },
    #[error("failed to read upload '{}': {source}", .path.display())]
    ReadUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stage '{}': {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine binary '{}' not found", .program.display())]
    BinaryNotFound { program: PathBuf, command_line: String },
    #[error("engine failed (exit_code={exit_code:?}): {command_line}")]
    ProcessFailed {
        exit_code: Option<i32>,
        command_line: String,
        stderr: String,
    },
    #[error("engine did not finish within {timeout:?}: {command_line}")]
    TimedOut {
        timeout: Duration,
        command_line: String,
        stderr: String,
    },
    #[error("result artifact '{}' is missing", .path.display())]
    ArtifactMissing { path: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LzwError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LzwError::InvalidParameter {
            message: message.into(),
        }
    }

    /// True for failures raised before a job exists; these never touch the
    /// result cache.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LzwError::MissingInput
                | LzwError::InvalidParameter { .. }
                | LzwError::UnrecognizedSuffix { .. }
                | LzwError::ReadUpload { .. }
        )
    }

    /// Operator-facing text: the message, followed by the attempted command
    /// line and the engine's error stream when there is one.
    pub fn diagnostic(&self) -> String {
        match self {
            LzwError::BinaryNotFound { command_line, .. } => {
                format!("{self}\ncommand: {command_line}")
            }
            LzwError::ProcessFailed {
                exit_code,
                command_line,
                stderr,
            } => {
                let code = exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                format!("engine exited with {code}\ncommand: {command_line}\n{stderr}")
            }
            LzwError::TimedOut {
                command_line,
                stderr,
                ..
            } => format!("{self}\ncommand: {command_line}\n{stderr}"),
            other => other.to_string(),
        }
    }
}
