use crate::paths;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

pub const KNOWN_KEYS: &[&str] = &["NODE", "CLI", "TIMEOUT_SECS", "LOG"];

const DEFAULT_NODE: &str = "node";
const DEFAULT_CLI: &str = "dist/cli.js";
const DEFAULT_LOG: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    pub node: String,
    pub cli: PathBuf,
    pub timeout_secs: Option<u64>,
    pub log: String,
}

impl Config {
    /// env `TWLINT_<KEY>` > `~/.twlint/config` > built-in default.
    pub fn load() -> Result<Self> {
        let file = load_file();
        Self::from_sources(|key| std::env::var(format!("TWLINT_{key}")).ok(), &file)
    }

    pub fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        file: &HashMap<String, String>,
    ) -> Result<Self> {
        let get = |key: &str| {
            env(key)
                .or_else(|| file.get(key).cloned())
                .filter(|v| !v.trim().is_empty())
        };

        let node = get("NODE").unwrap_or_else(|| DEFAULT_NODE.to_string());
        let cli_raw = get("CLI").unwrap_or_else(|| DEFAULT_CLI.to_string());
        let cli = paths::expand_path_buf(&cli_raw)
            .with_context(|| format!("invalid CLI path '{cli_raw}'"))?;
        let timeout_secs = match get("TIMEOUT_SECS") {
            Some(s) => Some(
                s.trim()
                    .parse::<u64>()
                    .with_context(|| format!("TIMEOUT_SECS must be a number of seconds, got '{s}'"))?,
            )
            .filter(|n| *n > 0),
            None => None,
        };
        let log = get("LOG").unwrap_or_else(|| DEFAULT_LOG.to_string());

        Ok(Self {
            node,
            cli,
            timeout_secs,
            log,
        })
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".twlint").join("config"))
}

pub fn load_file() -> HashMap<String, String> {
    config_path()
        .and_then(|p| std::fs::read_to_string(p).ok())
        .map(|content| parse_file(&content))
        .unwrap_or_default()
}

pub fn parse_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter(|l| !l.trim_start().starts_with('#') && !l.trim().is_empty())
        .filter_map(|l| {
            let (k, v) = l.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = Config::from_sources(no_env, &HashMap::new()).unwrap();
        assert_eq!(config.node, "node");
        assert_eq!(config.cli, PathBuf::from("dist/cli.js"));
        assert_eq!(config.timeout_secs, None);
        assert_eq!(config.log, "info");
    }

    #[test]
    fn parse_file_skips_comments_and_blanks() {
        let parsed = parse_file("# comment\n\nNODE = /usr/bin/node\nCLI=/opt/twlint/cli.js\nbogus line\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["NODE"], "/usr/bin/node");
        assert_eq!(parsed["CLI"], "/opt/twlint/cli.js");
    }

    #[test]
    fn env_overrides_file() {
        let file = parse_file("NODE=/from/file\nTIMEOUT_SECS=10");
        let env = |key: &str| (key == "NODE").then(|| "/from/env".to_string());
        let config = Config::from_sources(env, &file).unwrap();
        assert_eq!(config.node, "/from/env");
        assert_eq!(config.timeout_secs, Some(10));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let file = parse_file("TIMEOUT_SECS=0");
        let config = Config::from_sources(no_env, &file).unwrap();
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let file = parse_file("TIMEOUT_SECS=soon");
        let err = Config::from_sources(no_env, &file).unwrap_err();
        assert!(err.to_string().contains("TIMEOUT_SECS"));
    }

    #[test]
    fn absolute_cli_path_is_kept() {
        let file = parse_file("CLI=/opt/twlint/dist/cli.js");
        let config = Config::from_sources(no_env, &file).unwrap();
        assert_eq!(config.cli, PathBuf::from("/opt/twlint/dist/cli.js"));
    }
}
