use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "lzwflow.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub workspace_root: PathBuf,
    pub engine_path: PathBuf,
    pub engine_timeout_secs: u64,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            engine_path: PathBuf::from("./main"),
            engine_timeout_secs: 600,
            bind_addr: "127.0.0.1:8501".into(),
            max_upload_bytes: 64 * 1024 * 1024,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    /// `None` when the timeout is disabled (0).
    pub fn engine_timeout(&self) -> Option<Duration> {
        (self.engine_timeout_secs > 0).then(|| Duration::from_secs(self.engine_timeout_secs))
    }
}

/// Defaults, then the TOML file, then environment variables. An explicitly
/// named file must exist; the default one is optional.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match explicit {
        Some(path) => read_settings_file(path)?,
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.is_file() {
                read_settings_file(path)?
            } else {
                Settings::default()
            }
        }
    };

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_settings(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str::<Settings>(raw)?)
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
    if let Some(v) = var("LZWFLOW_WORKSPACE") {
        settings.workspace_root = PathBuf::from(v);
    }
    if let Some(v) = var("LZWFLOW_ENGINE") {
        settings.engine_path = PathBuf::from(v);
    }
    if let Some(v) = var("LZWFLOW_ENGINE_TIMEOUT_SECS") {
        settings.engine_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("LZWFLOW_ENGINE_TIMEOUT_SECS must be a number, got '{v}'"))?;
    }
    if let Some(v) = var("LZWFLOW_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("LZWFLOW_MAX_UPLOAD_BYTES") {
        settings.max_upload_bytes = v
            .trim()
            .parse()
            .with_context(|| format!("LZWFLOW_MAX_UPLOAD_BYTES must be a number, got '{v}'"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        assert_eq!(parse_settings("").expect("parse"), Settings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = parse_settings(
            r#"
            workspace_root = "/var/lib/lzwflow"
            engine_path = "/usr/local/bin/lzw"
            engine_timeout_secs = 0
            "#,
        )
        .expect("parse");

        assert_eq!(settings.workspace_root, PathBuf::from("/var/lib/lzwflow"));
        assert_eq!(settings.engine_path, PathBuf::from("/usr/local/bin/lzw"));
        assert_eq!(settings.engine_timeout(), None);
        assert_eq!(settings.bind_addr, "127.0.0.1:8501");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_settings("max_bits = 12").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LZWFLOW_WORKSPACE", "/tmp/ws"),
            ("LZWFLOW_ENGINE_TIMEOUT_SECS", "30"),
            ("LZWFLOW_BIND", "0.0.0.0:9000"),
        ]);
        let mut settings = Settings::default();
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string())).expect("env");

        assert_eq!(settings.workspace_root, PathBuf::from("/tmp/ws"));
        assert_eq!(settings.engine_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.bind_addr, "0.0.0.0:9000");
        assert_eq!(settings.engine_path, PathBuf::from("./main"));
    }

    #[test]
    fn malformed_numeric_env_is_an_error() {
        let mut settings = Settings::default();
        let result = apply_env(&mut settings, |key| {
            (key == "LZWFLOW_MAX_UPLOAD_BYTES").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }
}
