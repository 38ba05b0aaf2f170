use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::LzwError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Inputs,
    Outputs,
    Stats,
}

impl Area {
    pub const ALL: [Area; 3] = [Area::Inputs, Area::Outputs, Area::Stats];

    pub fn dir_name(self) -> &'static str {
        match self {
            Area::Inputs => "inputs",
            Area::Outputs => "outputs",
            Area::Stats => "stats",
        }
    }
}

/// The staging and result area shared by every job.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, area: Area) -> PathBuf {
        self.root.join(area.dir_name())
    }

    /// Creates `dir` and its parents if absent. Calling it again is a no-op.
    pub fn ensure(dir: &Path) -> Result<(), LzwError> {
        fs::create_dir_all(dir).map_err(|source| LzwError::Staging {
            path: dir.to_path_buf(),
            source,
        })
    }

    pub fn ensure_all(&self) -> Result<(), LzwError> {
        for area in Area::ALL {
            Self::ensure(&self.dir(area))?;
        }
        Ok(())
    }

    /// Writes uploaded bytes to `path`, replacing any previous file.
    pub fn stage(&self, path: &Path, bytes: &[u8]) -> Result<(), LzwError> {
        if let Some(parent) = path.parent() {
            Self::ensure(parent)?;
        }
        fs::write(path, bytes).map_err(|source| LzwError::Staging {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "staged upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("nested").join("inputs");

        Workspace::ensure(&dir).expect("first ensure");
        Workspace::ensure(&dir).expect("second ensure");
        assert!(dir.is_dir());
    }

    #[test]
    fn ensure_all_creates_the_three_areas() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path());

        workspace.ensure_all().expect("ensure all");
        assert!(temp.path().join("inputs").is_dir());
        assert!(temp.path().join("outputs").is_dir());
        assert!(temp.path().join("stats").is_dir());
    }

    #[test]
    fn ensure_fails_when_a_file_is_in_the_way() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("inputs");
        fs::write(&blocker, b"not a directory").expect("blocker");

        let err = Workspace::ensure(&blocker.join("inner")).expect_err("should fail");
        assert!(matches!(err, LzwError::Staging { .. }));
    }

    #[test]
    fn stage_overwrites_previous_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path());
        let path = workspace.dir(Area::Inputs).join("report.txt");

        workspace.stage(&path, b"first").expect("stage");
        workspace.stage(&path, b"second").expect("restage");
        assert_eq!(fs::read(&path).expect("read"), b"second");
    }
}
