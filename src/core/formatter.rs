use std::time::Duration;

use crate::core::job::{JobResult, JobSettings};
use crate::core::stats::StatsReport;

pub fn format_settings(settings: &JobSettings) -> String {
    let mut line = format!("{} max_bits={}", settings.direction, settings.max_bits);
    if settings.fixed_table {
        line.push_str(" fixed");
    }
    if settings.collect_stats {
        line.push_str(" stats");
    }
    line
}

pub fn format_result_lines(result: &JobResult) -> Vec<String> {
    let mut lines = Vec::new();
    let elapsed = format_duration(result.elapsed);

    if result.succeeded {
        lines.push(format!(
            "Done   : {} {} in {elapsed}",
            result.direction, result.original_filename
        ));
        if let Some(path) = &result.result_path {
            let size = std::fs::metadata(path)
                .map(|meta| format_bytes(meta.len()))
                .unwrap_or_else(|_| "missing".to_string());
            lines.push(format!("Result : {} ({size})", path.display()));
        }
        if let Some(path) = &result.stats_path {
            lines.push(format!("Stats  : {}", path.display()));
        }
    } else {
        lines.push(format!(
            "Failed : {} {} after {elapsed}",
            result.direction, result.original_filename
        ));
        if let Some(error) = &result.error_output {
            lines.extend(error.lines().map(|line| format!("  {line}")));
        }
    }

    lines
}

/// One-line digest of the first few parsed fields, for compact displays.
pub fn format_stats_digest(report: &StatsReport, limit: usize) -> Option<String> {
    if report.fields.is_empty() {
        return None;
    }
    let parts: Vec<String> = report
        .fields
        .iter()
        .take(limit)
        .map(|field| format!("{}={}", field.key, field.value))
        .collect();
    Some(parts.join("  "))
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{millis}ms");
    }
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let value = bytes as f64;
    if value >= GB {
        format!("{:.2} GB", value / GB)
    } else if value >= MB {
        format!("{:.2} MB", value / MB)
    } else if value >= KB {
        format!("{:.2} KB", value / KB)
    } else {
        format!("{} B", bytes)
    }
}
