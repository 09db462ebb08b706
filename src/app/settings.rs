//! Effective run settings: CLI flags over config file over defaults.

use std::path::PathBuf;

use webdownload_core::{
    CoordinatorSettings, PlanRules, StorageLayout,
    download::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_DIRECT_REPORT_MARKER, READ_TIMEOUT_SECS},
    user_agent::default_user_agent,
};

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::Args;

const APP_DIR_NAME: &str = ".webdownload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSettings {
    pub output_dir: PathBuf,
    pub app_dir: PathBuf,
    pub scoped_storage: bool,
    pub auto_confirm: bool,
    pub user_agent: String,
    pub cookies_file: Option<PathBuf>,
    pub direct_report_markers: Vec<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl RunSettings {
    pub(crate) fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        let output_dir = args
            .output_dir
            .clone()
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let app_dir = args
            .app_dir
            .clone()
            .or(file.app_dir)
            .unwrap_or_else(|| output_dir.join(APP_DIR_NAME));

        Self {
            app_dir,
            scoped_storage: !args.legacy_storage && file.scoped_storage.unwrap_or(true),
            auto_confirm: args.yes || file.auto_confirm.unwrap_or(false),
            user_agent: args
                .user_agent
                .clone()
                .or(file.user_agent)
                .unwrap_or_else(default_user_agent),
            cookies_file: args.cookies.clone().or(file.cookies_file),
            direct_report_markers: file
                .direct_report_markers
                .unwrap_or_else(|| vec![DEFAULT_DIRECT_REPORT_MARKER.to_string()]),
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
            output_dir,
        }
    }

    pub(crate) fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.output_dir, &self.app_dir, self.scoped_storage)
    }

    pub(crate) fn plan_rules(&self) -> PlanRules {
        PlanRules {
            scoped_storage: self.scoped_storage,
            direct_report_markers: self.direct_report_markers.clone(),
            ..PlanRules::default()
        }
    }

    pub(crate) fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            layout: self.layout(),
            rules: self.plan_rules(),
            user_agent: self.user_agent.clone(),
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
        }
    }
}

/// Default log level when `RUST_LOG` is unset.
///
/// Priority: `--quiet` > `-v/-vv` > config `verbosity` > info.
pub(crate) fn default_log_level(args: &Args, file: Option<VerbositySetting>) -> &'static str {
    if args.quiet {
        return "error";
    }
    match (args.verbose, file) {
        (1, _) => "debug",
        (2.., _) => "trace",
        (0, Some(VerbositySetting::Quiet)) => "error",
        (0, Some(VerbositySetting::Verbose)) => "debug",
        (0, Some(VerbositySetting::Debug)) => "trace",
        (0, Some(VerbositySetting::Default) | None) => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["webdownload"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_config() {
        let settings = RunSettings::resolve(&args(&[]), None);
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.app_dir, PathBuf::from("./.webdownload"));
        assert!(settings.scoped_storage);
        assert!(!settings.auto_confirm);
        assert_eq!(settings.direct_report_markers, vec!["DownloadReport".to_string()]);
        assert_eq!(settings.connect_timeout_secs, 30);
    }

    #[test]
    fn test_flags_override_config() {
        let file = FileConfig {
            output_dir: Some("/from/config".into()),
            scoped_storage: Some(true),
            user_agent: Some("ConfigAgent".into()),
            read_timeout_secs: Some(60),
            ..FileConfig::default()
        };
        let settings = RunSettings::resolve(
            &args(&["-o", "/from/flag", "--legacy-storage", "--user-agent", "FlagAgent"]),
            Some(&file),
        );
        assert_eq!(settings.output_dir, PathBuf::from("/from/flag"));
        assert!(!settings.scoped_storage);
        assert_eq!(settings.user_agent, "FlagAgent");
        assert_eq!(settings.read_timeout_secs, 60);
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let file = FileConfig {
            auto_confirm: Some(true),
            scoped_storage: Some(false),
            direct_report_markers: Some(vec!["Export".into()]),
            ..FileConfig::default()
        };
        let settings = RunSettings::resolve(&args(&[]), Some(&file));
        assert!(settings.auto_confirm);
        assert!(!settings.scoped_storage);
        assert!(settings.plan_rules().is_direct_report("https://x/Export?id=1"));
        assert!(!settings.plan_rules().scoped_storage);
    }

    #[test]
    fn test_log_level_priority() {
        assert_eq!(default_log_level(&args(&[]), None), "info");
        assert_eq!(default_log_level(&args(&["-v"]), Some(VerbositySetting::Quiet)), "debug");
        assert_eq!(default_log_level(&args(&["-q", "-vv"]), None), "error");
        assert_eq!(default_log_level(&args(&[]), Some(VerbositySetting::Debug)), "trace");
    }
}
