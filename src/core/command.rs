use std::path::Path;

use crate::core::job::{Direction, Job, MaxBits};

/// Arguments for one engine run, rendered in the order the engine parses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub input: String,
    pub direction: Direction,
    pub max_bits: MaxBits,
    pub fixed_table: bool,
    pub collect_stats: bool,
}

impl EngineCommand {
    pub fn for_job(job: &Job, relative_input: impl Into<String>) -> Self {
        Self {
            input: relative_input.into(),
            direction: job.direction(),
            max_bits: job.max_bits(),
            fixed_table: job.fixed_table(),
            collect_stats: job.collect_stats(),
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        args.push(self.input.clone());
        args.push(self.direction.flag().to_string());
        args.push("--max-bits".to_string());
        args.push(self.max_bits.to_string());

        if self.fixed_table {
            args.push("--fixed".to_string());
        }

        if self.collect_stats {
            args.push("--stats".to_string());
        }

        args
    }

    /// Shell-quoted command line, for diagnostics.
    pub fn command_line(&self, program: &Path) -> String {
        let mut words = Vec::with_capacity(6);
        words.push(program.to_string_lossy().into_owned());
        words.extend(self.to_args());
        shell_words::join(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobSettings;

    fn command(direction: Direction, fixed_table: bool, collect_stats: bool) -> EngineCommand {
        EngineCommand {
            input: "report.txt".to_string(),
            direction,
            max_bits: MaxBits::new(12).expect("bits"),
            fixed_table,
            collect_stats,
        }
    }

    #[test]
    fn minimal_compress_arguments() {
        assert_eq!(
            command(Direction::Compress, false, false).to_args(),
            vec!["report.txt", "--compress", "--max-bits", "12"]
        );
    }

    #[test]
    fn flags_follow_max_bits_in_fixed_order() {
        assert_eq!(
            command(Direction::Decompress, true, true).to_args(),
            vec!["report.txt", "--decompress", "--max-bits", "12", "--fixed", "--stats"]
        );
        assert_eq!(
            command(Direction::Compress, false, true).to_args(),
            vec!["report.txt", "--compress", "--max-bits", "12", "--stats"]
        );
    }

    #[test]
    fn built_from_job_settings() {
        let job = Job::new(
            "sample.bin.lzw",
            JobSettings {
                direction: Direction::Decompress,
                max_bits: MaxBits::new(16).expect("bits"),
                fixed_table: true,
                collect_stats: false,
            },
        )
        .expect("job");
        let cmd = EngineCommand::for_job(&job, job.original_filename());
        assert_eq!(
            cmd.to_args(),
            vec!["sample.bin.lzw", "--decompress", "--max-bits", "16", "--fixed"]
        );
    }

    #[test]
    fn command_line_quotes_awkward_names() {
        let mut cmd = command(Direction::Compress, false, false);
        cmd.input = "my report.txt".to_string();
        assert_eq!(
            cmd.command_line(Path::new("./main")),
            "./main 'my report.txt' --compress --max-bits 12"
        );
    }
}
