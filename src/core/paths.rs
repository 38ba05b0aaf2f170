use std::path::PathBuf;

use crate::core::job::Direction;
use crate::core::workspace::{Area, Workspace};

pub const COMPRESSED_SUFFIX: &str = ".lzw";
pub const STATS_SUFFIX: &str = ".stats";

/// Every path a job touches, derived from the original filename and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    /// Staging path with its area prefix removed; this is what the engine is given.
    pub relative_input: String,
    pub staging: PathBuf,
    pub result: PathBuf,
    pub stats: PathBuf,
}

pub fn resolve(workspace: &Workspace, original_filename: &str, direction: Direction) -> JobPaths {
    JobPaths {
        relative_input: original_filename.to_string(),
        staging: derive_staging_path(workspace, original_filename, direction),
        result: derive_result_path(workspace, original_filename, direction),
        stats: derive_stats_path(workspace, original_filename),
    }
}

pub fn staging_area(direction: Direction) -> Area {
    match direction {
        Direction::Compress => Area::Inputs,
        Direction::Decompress => Area::Outputs,
    }
}

pub fn derive_staging_path(workspace: &Workspace, original_filename: &str, direction: Direction) -> PathBuf {
    workspace.dir(staging_area(direction)).join(original_filename)
}

pub fn derive_result_path(workspace: &Workspace, original_filename: &str, direction: Direction) -> PathBuf {
    match direction {
        Direction::Compress => workspace
            .dir(Area::Outputs)
            .join(format!("{original_filename}{COMPRESSED_SUFFIX}")),
        Direction::Decompress => workspace
            .dir(Area::Inputs)
            .join(strip_last_4_chars(original_filename)),
    }
}

/// Stats reports are keyed off the input side's relative name in both directions.
pub fn derive_stats_path(workspace: &Workspace, relative_input: &str) -> PathBuf {
    workspace
        .dir(Area::Stats)
        .join(format!("{relative_input}{STATS_SUFFIX}"))
}

/// Drops the last four characters regardless of what they are.
pub fn strip_last_4_chars(name: &str) -> &str {
    match name.char_indices().rev().nth(3) {
        Some((idx, _)) => &name[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        Workspace::new("/srv/lzw")
    }

    #[test]
    fn compress_results_land_in_outputs_with_lzw_suffix() {
        let ws = workspace();
        for name in ["report.txt", "a", "archive.tar.gz", "no_ext", "ünïcode.bin"] {
            assert_eq!(
                derive_result_path(&ws, name, Direction::Compress),
                PathBuf::from("/srv/lzw/outputs").join(format!("{name}.lzw"))
            );
        }
    }

    #[test]
    fn decompress_results_drop_last_four_chars_into_inputs() {
        let ws = workspace();
        let cases = [
            ("sample.bin.lzw", "sample.bin"),
            ("abcd.lzw", "abcd"),
            ("data.xyz1", "data."),
            ("wxyz", ""),
        ];
        for (name, expected) in cases {
            assert_eq!(
                derive_result_path(&ws, name, Direction::Decompress),
                PathBuf::from("/srv/lzw/inputs").join(expected)
            );
        }
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(strip_last_4_chars("café.lzw"), "café");
        assert_eq!(strip_last_4_chars("naïve"), "n");
        assert_eq!(strip_last_4_chars("abc"), "");
        assert_eq!(strip_last_4_chars(""), "");
    }

    #[test]
    fn staging_follows_direction() {
        let ws = workspace();
        assert_eq!(
            derive_staging_path(&ws, "report.txt", Direction::Compress),
            PathBuf::from("/srv/lzw/inputs/report.txt")
        );
        assert_eq!(
            derive_staging_path(&ws, "report.txt.lzw", Direction::Decompress),
            PathBuf::from("/srv/lzw/outputs/report.txt.lzw")
        );
    }

    #[test]
    fn stats_path_accumulates_suffix_from_input_name() {
        let ws = workspace();
        let compress = resolve(&ws, "report.txt", Direction::Compress);
        let decompress = resolve(&ws, "report.txt.lzw", Direction::Decompress);

        assert_eq!(compress.stats, PathBuf::from("/srv/lzw/stats/report.txt.stats"));
        assert_eq!(decompress.stats, PathBuf::from("/srv/lzw/stats/report.txt.lzw.stats"));
        assert_eq!(
            derive_stats_path(&ws, "report.txt.stats"),
            PathBuf::from("/srv/lzw/stats/report.txt.stats.stats")
        );
    }

    #[test]
    fn round_trip_decompression_stages_where_compression_wrote() {
        let ws = workspace();
        let compress = resolve(&ws, "sample.bin", Direction::Compress);
        let artifact = compress
            .result
            .file_name()
            .and_then(|name| name.to_str())
            .expect("artifact name");
        let decompress = resolve(&ws, artifact, Direction::Decompress);

        assert_eq!(decompress.staging, compress.result);
        assert_eq!(decompress.result, compress.staging);
        assert_eq!(decompress.result.file_name().and_then(|n| n.to_str()), Some("sample.bin"));
    }

    #[test]
    fn engine_receives_bare_filename() {
        let paths = resolve(&workspace(), "report.txt", Direction::Compress);
        assert_eq!(paths.relative_input, "report.txt");
    }
}
