use std::path::{Path, PathBuf};

use crate::core::error::LzwError;
use crate::core::job::JobResult;
use crate::core::stats::{read_stats_report, StatsReport};

/// Single-slot store for the last completed job of one session.
#[derive(Debug, Clone, Default)]
pub struct JobResultCache {
    current: Option<JobResult>,
}

impl JobResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&JobResult> {
        self.current.as_ref()
    }

    /// Replaces whatever was held before; results are never merged.
    pub fn record(&mut self, result: JobResult) -> &JobResult {
        self.current.insert(result)
    }

    /// File name and bytes of the last successful artifact.
    pub fn read_artifact(&self) -> Result<Option<(String, Vec<u8>)>, LzwError> {
        let Some(result) = self.current.as_ref() else {
            return Ok(None);
        };
        let (Some(path), Some(name)) = (result.result_path.as_ref(), result.artifact_name()) else {
            return Ok(None);
        };
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some((name, bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LzwError::ArtifactMissing { path: path.clone() })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Copies the last artifact to `dest`, or into it when `dest` is a
    /// directory. Returns the written path.
    pub fn save_artifact(&self, dest: &Path) -> Result<Option<PathBuf>, LzwError> {
        let Some((name, bytes)) = self.read_artifact()? else {
            return Ok(None);
        };
        let target = if dest.is_dir() { dest.join(name) } else { dest.to_path_buf() };
        std::fs::write(&target, bytes)?;
        Ok(Some(target))
    }

    /// The stats report, if one was requested and the engine wrote it.
    pub fn read_stats(&self) -> Result<Option<StatsReport>, LzwError> {
        let Some(path) = self.current.as_ref().and_then(|r| r.stats_path.as_ref()) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        read_stats_report(path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::core::job::{Direction, Job, JobSettings};

    fn job() -> Job {
        Job::new(
            "report.txt",
            JobSettings {
                direction: Direction::Compress,
                collect_stats: true,
                ..JobSettings::default()
            },
        )
        .expect("job")
    }

    #[test]
    fn empty_cache_offers_nothing() {
        let cache = JobResultCache::new();
        assert!(cache.current().is_none());
        assert!(cache.read_artifact().expect("artifact").is_none());
        assert!(cache.read_stats().expect("stats").is_none());
    }

    #[test]
    fn failure_replaces_previous_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let artifact = temp.path().join("report.txt.lzw");
        fs::write(&artifact, b"lzw").expect("artifact");

        let mut cache = JobResultCache::new();
        cache.record(JobResult::success(&job(), artifact, None, Duration::ZERO));
        assert!(cache.read_artifact().expect("artifact").is_some());

        cache.record(JobResult::failure(&job(), "bad table", Duration::ZERO));
        let current = cache.current().expect("current");
        assert!(!current.succeeded);
        assert!(current.result_path.is_none());
        assert!(cache.read_artifact().expect("artifact").is_none());
    }

    #[test]
    fn reads_artifact_and_stats_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let artifact = temp.path().join("report.txt.lzw");
        let stats = temp.path().join("report.txt.stats");
        fs::write(&artifact, b"\x01\x02").expect("artifact");
        fs::write(&stats, "ratio: 0.5\n").expect("stats");

        let mut cache = JobResultCache::new();
        cache.record(JobResult::success(&job(), artifact, Some(stats), Duration::ZERO));

        let (name, bytes) = cache.read_artifact().expect("read").expect("some");
        assert_eq!(name, "report.txt.lzw");
        assert_eq!(bytes, vec![1, 2]);
        let report = cache.read_stats().expect("read").expect("some");
        assert_eq!(report.field("ratio"), Some("0.5"));
    }

    #[test]
    fn save_artifact_into_directory_keeps_the_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let artifact = temp.path().join("report.txt.lzw");
        fs::write(&artifact, b"lzw").expect("artifact");
        let downloads = temp.path().join("downloads");
        fs::create_dir(&downloads).expect("downloads");

        let mut cache = JobResultCache::new();
        assert!(cache.save_artifact(&downloads).expect("save").is_none());

        cache.record(JobResult::success(&job(), artifact, None, Duration::ZERO));
        let saved = cache.save_artifact(&downloads).expect("save").expect("written");
        assert_eq!(saved, downloads.join("report.txt.lzw"));
        assert_eq!(fs::read(saved).expect("read"), b"lzw");

        let renamed = cache
            .save_artifact(&temp.path().join("copy.bin"))
            .expect("save")
            .expect("written");
        assert_eq!(renamed, temp.path().join("copy.bin"));
    }

    #[test]
    fn vanished_artifact_is_an_error_and_missing_stats_are_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cache = JobResultCache::new();
        cache.record(JobResult::success(
            &job(),
            temp.path().join("gone.lzw"),
            Some(temp.path().join("gone.stats")),
            Duration::ZERO,
        ));

        assert!(matches!(
            cache.read_artifact(),
            Err(LzwError::ArtifactMissing { .. })
        ));
        assert!(cache.read_stats().expect("stats").is_none());
    }
}
