use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::core::error::LzwError;
use crate::core::paths::COMPRESSED_SUFFIX;

pub const MAX_FILENAME_BYTES: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Compress,
    Decompress,
}

impl Direction {
    pub fn flag(self) -> &'static str {
        match self {
            Direction::Compress => "--compress",
            Direction::Decompress => "--decompress",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Compress => "compress",
            Direction::Decompress => "decompress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LzwError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compress" => Ok(Direction::Compress),
            "decompress" => Ok(Direction::Decompress),
            other => Err(LzwError::invalid(format!("unknown direction '{other}'"))),
        }
    }
}

/// Maximum LZW code width accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MaxBits(u8);

impl MaxBits {
    pub const MIN: u32 = 9;
    pub const MAX: u32 = 16;
    pub const DEFAULT: u32 = 12;

    pub fn new(value: u32) -> Result<Self, LzwError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(LzwError::invalid(format!(
                "max bits must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for MaxBits {
    fn default() -> Self {
        Self(Self::DEFAULT as u8)
    }
}

impl fmt::Display for MaxBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub direction: Direction,
    pub max_bits: MaxBits,
    pub fixed_table: bool,
    pub collect_stats: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            direction: Direction::Compress,
            max_bits: MaxBits::default(),
            fixed_table: false,
            collect_stats: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Reads a local file as if it had been uploaded under its own name.
    pub fn from_path(path: &Path) -> Result<Self, LzwError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LzwError::invalid(format!("'{}' has no file name", path.display())))?;
        let bytes = std::fs::read(path).map_err(|source| LzwError::ReadUpload {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { filename, bytes })
    }
}

/// One validated compress-or-decompress request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    original_filename: String,
    settings: JobSettings,
}

impl Job {
    pub fn new(original_filename: impl Into<String>, settings: JobSettings) -> Result<Self, LzwError> {
        let original_filename = original_filename.into();
        validate_filename(&original_filename)?;

        if settings.direction == Direction::Decompress
            && (!original_filename.ends_with(COMPRESSED_SUFFIX)
                || original_filename.len() == COMPRESSED_SUFFIX.len())
        {
            return Err(LzwError::UnrecognizedSuffix {
                filename: original_filename,
            });
        }

        Ok(Self {
            original_filename,
            settings,
        })
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn direction(&self) -> Direction {
        self.settings.direction
    }

    pub fn max_bits(&self) -> MaxBits {
        self.settings.max_bits
    }

    pub fn fixed_table(&self) -> bool {
        self.settings.fixed_table
    }

    pub fn collect_stats(&self) -> bool {
        self.settings.collect_stats
    }
}

fn validate_filename(name: &str) -> Result<(), LzwError> {
    if name.trim().is_empty() {
        return Err(LzwError::invalid("filename cannot be empty"));
    }
    if name.len() > MAX_FILENAME_BYTES {
        return Err(LzwError::invalid("filename is too long"));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(LzwError::invalid("filename must not contain path separators"));
    }
    if name == "." || name == ".." {
        return Err(LzwError::invalid(format!("'{name}' is not a file name")));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub original_filename: String,
    pub direction: Direction,
    pub succeeded: bool,
    pub result_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
    pub error_output: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl JobResult {
    pub fn success(job: &Job, result_path: PathBuf, stats_path: Option<PathBuf>, elapsed: Duration) -> Self {
        Self {
            original_filename: job.original_filename().to_string(),
            direction: job.direction(),
            succeeded: true,
            result_path: Some(result_path),
            stats_path,
            error_output: None,
            elapsed,
        }
    }

    pub fn failure(job: &Job, error_output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            original_filename: job.original_filename().to_string(),
            direction: job.direction(),
            succeeded: false,
            result_path: None,
            stats_path: None,
            error_output: Some(error_output.into()),
            elapsed,
        }
    }

    pub fn status(&self) -> JobStatus {
        if self.succeeded {
            JobStatus::Finished
        } else {
            JobStatus::Failed
        }
    }

    /// File name offered for download.
    pub fn artifact_name(&self) -> Option<String> {
        self.result_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}
