use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cloner_engine::CloneSettings;
use engine_logging::engine_info;
use serde::{Deserialize, Serialize};

use super::cli::Cli;

/// Settings read from a RON file. Every field is optional; missing ones keep
/// the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub redirect_limit: Option<usize>,
    pub max_asset_bytes: Option<u64>,
    pub css_import_depth: Option<usize>,
    pub user_agent: Option<String>,
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = ron::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    engine_info!("Loaded settings from {:?}", path);
    Ok(config)
}

/// Defaults, then the config file, then command-line flags.
pub(crate) fn build_settings(file: &FileConfig, cli: &Cli) -> CloneSettings {
    let mut settings = match cli.output_dir.as_ref().or(file.output_dir.as_ref()) {
        Some(dir) => CloneSettings::default_with_output(dir.clone()),
        None => CloneSettings::default(),
    };

    if let Some(limit) = cli.concurrency.or(file.concurrency) {
        settings.concurrency_limit = limit.max(1);
    }
    if let Some(secs) = cli.timeout_secs.or(file.timeout_secs) {
        settings.fetch.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.connect_timeout_secs {
        settings.fetch.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(limit) = file.redirect_limit {
        settings.fetch.redirect_limit = limit;
    }
    if let Some(max_bytes) = file.max_asset_bytes {
        settings.fetch.max_bytes = max_bytes;
    }
    if let Some(depth) = file.css_import_depth {
        settings.css_import_depth = depth;
    }
    if let Some(agent) = cli.user_agent.as_ref().or(file.user_agent.as_ref()) {
        settings.fetch.user_agent = agent.clone();
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use cloner_engine::{DEFAULT_CONCURRENCY, DEFAULT_USER_AGENT};
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["cloner_app", "example.com"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let settings = build_settings(&FileConfig::default(), &cli(&[]));
        assert_eq!(settings.concurrency_limit, DEFAULT_CONCURRENCY);
        assert_eq!(settings.fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.output_root, std::env::temp_dir());
    }

    #[test]
    fn flags_override_file_values() {
        let file = FileConfig {
            output_dir: Some(PathBuf::from("/from/file")),
            concurrency: Some(2),
            timeout_secs: Some(5),
            user_agent: Some("FileAgent/1".to_string()),
            css_import_depth: Some(0),
            ..FileConfig::default()
        };
        let settings = build_settings(&file, &cli(&["--concurrency", "16", "-o", "/from/cli"]));

        assert_eq!(settings.concurrency_limit, 16);
        assert_eq!(settings.output_root, PathBuf::from("/from/cli"));
        assert_eq!(settings.fetch.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.fetch.user_agent, "FileAgent/1");
        assert_eq!(settings.css_import_depth, 0);
    }

    #[test]
    fn ron_file_is_loaded() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cloner.ron");
        fs::write(
            &path,
            r#"(
                concurrency: Some(3),
                max_asset_bytes: Some(1024),
                user_agent: Some("Mirror/2.0"),
            )"#,
        )
        .unwrap();

        let config = load_file_config(&path).unwrap();
        assert_eq!(
            config,
            FileConfig {
                concurrency: Some(3),
                max_asset_bytes: Some(1024),
                user_agent: Some("Mirror/2.0".to_string()),
                ..FileConfig::default()
            }
        );
    }

    #[test]
    fn malformed_ron_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("broken.ron");
        fs::write(&path, "(concurrency: ").unwrap();
        assert!(load_file_config(&path).is_err());
        assert!(load_file_config(&temp.path().join("missing.ron")).is_err());
    }
}
