//! Config file defaults for the CLI.
//!
//! `key = value` lines, `#` comments, strings in double quotes. CLI flags
//! override everything read here.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Shared-storage root (public `Download/` and `Pictures/`).
    pub output_dir: Option<PathBuf>,
    /// App-private directory used under scoped storage.
    pub app_dir: Option<PathBuf>,
    pub scoped_storage: Option<bool>,
    /// Answer yes to every confirmation.
    pub auto_confirm: Option<bool>,
    pub user_agent: Option<String>,
    /// Netscape-format cookie file.
    pub cookies_file: Option<PathBuf>,
    /// URL substrings of endpoints that always serve PDF reports.
    pub direct_report_markers: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates values against the same limits the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(agent) = &self.user_agent
            && agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }
        if let Some(markers) = &self.direct_report_markers
            && markers.is_empty()
        {
            bail!("Invalid config value for `direct_report_markers`: expected at least one marker");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// `$XDG_CONFIG_HOME/webdownload/config.toml`, else
/// `$HOME/.config/webdownload/config.toml`.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("webdownload").join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("webdownload")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Loads the default config file; a missing file yields `None`.
pub fn load_default_file_config() -> Result<Option<FileConfig>> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (index, raw_line) in raw.lines().enumerate() {
        let line_number = index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };
        let (key, value) = (key.trim(), value.trim());
        let context = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(parse_string_literal(value).with_context(context)?.into());
            }
            "app_dir" => cfg.app_dir = Some(parse_string_literal(value).with_context(context)?.into()),
            "scoped_storage" => cfg.scoped_storage = Some(parse_boolean(value).with_context(context)?),
            "auto_confirm" => cfg.auto_confirm = Some(parse_boolean(value).with_context(context)?),
            "user_agent" => cfg.user_agent = Some(parse_string_literal(value).with_context(context)?),
            "cookies_file" => {
                cfg.cookies_file = Some(parse_string_literal(value).with_context(context)?.into());
            }
            "direct_report_markers" => {
                let list = parse_string_literal(value).with_context(context)?;
                cfg.direct_report_markers = Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(ToString::to_string)
                        .collect(),
                );
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "verbosity" => {
                let label = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&label).with_context(context)?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_number}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw: &str) -> Result<String> {
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(ToString::to_string)
        .context("Expected double-quoted string")
}

fn parse_integer_u64(raw: &str) -> Result<u64> {
    let token = raw.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    Ok(token.parse::<u64>()?)
}

fn parse_boolean(raw: &str) -> Result<bool> {
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
