use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::error::LzwError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatField {
    pub key: String,
    pub value: String,
}

/// A stats report as written by the engine: the raw lines plus whatever
/// `key: value` pairs could be picked out of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub lines: Vec<String>,
    pub fields: Vec<StatField>,
}

impl StatsReport {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key.eq_ignore_ascii_case(key))
            .map(|field| field.value.as_str())
    }
}

static RE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _()%/.#-]*?)\s*[:=]\s*(\S.*?)\s*$").unwrap());

pub fn read_stats_report(path: &Path) -> Result<StatsReport, LzwError> {
    let raw = std::fs::read(path)?;
    Ok(parse_stats_text(&String::from_utf8_lossy(&raw)))
}

pub fn parse_stats_text(text: &str) -> StatsReport {
    let lines: Vec<String> = text
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();

    let fields = lines
        .iter()
        .filter_map(|line| {
            let capture = RE_FIELD.captures(line)?;
            Some(StatField {
                key: capture.get(1)?.as_str().to_string(),
                value: capture.get(2)?.as_str().to_string(),
            })
        })
        .collect();

    StatsReport { lines, fields }
}
