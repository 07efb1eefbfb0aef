//! Configuration management for covwatch.
//!
//! This module defines the structure of the optional `covwatch.toml` file and
//! resolves it, together with the command-line flags, into the immutable
//! settings a watch run uses.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::runner::CommandLine;
use crate::watch::FileMatcher;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Top-level configuration structure corresponding to `covwatch.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Generate the HTML coverage report after passing tests.
    pub html_coverage: Option<bool>,
    /// Skip the build step.
    pub only_test: Option<bool>,
    /// Print nothing below the test header when tests pass.
    pub silent_test: Option<bool>,
    /// Stop the test run at the first failure.
    pub fail_fast: Option<bool>,
    /// Delay in milliseconds after a change before the next cycle.
    pub debounce_ms: Option<u64>,
    /// Commands and markers of the watched toolchain.
    pub toolchain: Option<ToolchainConfig>,
    /// Which files trigger a new cycle.
    pub watch: Option<FilesConfig>,
}

/// The `[toolchain]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Build command (e.g. "go install ./...").
    pub build: Option<String>,
    /// Test program and subcommand (e.g. "go test").
    pub test: Option<String>,
    /// Arguments placed after the optional flags (e.g. "-cover ./...").
    pub test_args: Option<String>,
    /// Flag forwarded when fail-fast is on.
    pub fail_fast_flag: Option<String>,
    /// Flag that precedes the coverage profile path.
    pub profile_flag: Option<String>,
    /// Coverage report command; `{profile}` and `{report}` are substituted.
    pub cover_html: Option<String>,
    /// Coverage profile path.
    pub profile: Option<String>,
    /// HTML report path.
    pub report: Option<String>,
    /// Token highlighted in failing test output.
    pub failure_marker: Option<String>,
    /// Prefix of per-assertion detail lines dropped from the summary table.
    pub detail_prefix: Option<String>,
}

/// The `[watch]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesConfig {
    /// Globs of watched files, relative to the working directory.
    pub include: Option<Vec<String>>,
    /// Globs or directory names excluded from watching.
    pub ignore: Option<Vec<String>>,
    /// Whether `.gitignore` rules exclude files (default: true).
    pub gitignore: Option<bool>,
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Per-run switches. Set once at startup and only read afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchConfig {
    pub html_coverage: bool,
    pub only_test: bool,
    pub silent_test: bool,
    pub fail_fast: bool,
}

impl WatchConfig {
    /// Turns on every switch set in the file; flags already on stay on.
    fn merged(self, config: &Config) -> Self {
        Self {
            html_coverage: self.html_coverage || config.html_coverage.unwrap_or(false),
            only_test: self.only_test || config.only_test.unwrap_or(false),
            silent_test: self.silent_test || config.silent_test.unwrap_or(false),
            fail_fast: self.fail_fast || config.fail_fast.unwrap_or(false),
        }
    }
}

/// Resolved commands of the watched toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    build: CommandLine,
    test: CommandLine,
    test_args: Vec<String>,
    fail_fast_flag: Option<String>,
    profile_flag: String,
    cover_html: CommandLine,
    pub profile: String,
    pub report: String,
    pub failure_marker: String,
    pub detail_prefix: String,
}

impl Toolchain {
    fn from_config(config: &ToolchainConfig) -> Result<Self> {
        let profile = config.profile.clone().unwrap_or_else(|| "cover.out".to_string());
        let report = config.report.clone().unwrap_or_else(|| "cover.html".to_string());
        let build = CommandLine::parse(config.build.as_deref().unwrap_or("go install ./..."))
            .context("invalid toolchain.build")?;
        let test = CommandLine::parse(config.test.as_deref().unwrap_or("go test"))
            .context("invalid toolchain.test")?;
        let test_args = shell_words::split(
            config
                .test_args
                .as_deref()
                .unwrap_or("-cover -covermode count ./..."),
        )
        .context("invalid toolchain.test_args")?;
        let cover_template = config
            .cover_html
            .as_deref()
            .unwrap_or("go tool cover -html {profile} -o {report}");
        let cover_html = CommandLine::parse(
            &cover_template
                .replace("{profile}", &shell_words::quote(&profile))
                .replace("{report}", &shell_words::quote(&report)),
        )
        .context("invalid toolchain.cover_html")?;
        let fail_fast_flag = match config.fail_fast_flag.as_deref() {
            Some("") => None,
            Some(flag) => Some(flag.to_string()),
            None => Some("-failfast".to_string()),
        };
        let profile_flag = config
            .profile_flag
            .clone()
            .unwrap_or_else(|| "-coverprofile".to_string());
        if profile_flag.is_empty() {
            bail!("toolchain.profile_flag must not be empty");
        }

        Ok(Self {
            build,
            test,
            test_args,
            fail_fast_flag,
            profile_flag,
            cover_html,
            profile,
            report,
            failure_marker: config
                .failure_marker
                .clone()
                .unwrap_or_else(|| "FAIL".to_string()),
            detail_prefix: config
                .detail_prefix
                .clone()
                .unwrap_or_else(|| "    ".to_string()),
        })
    }

    pub fn build_command(&self) -> CommandLine {
        self.build.clone()
    }

    /// Assembles the test invocation for the given switches.
    pub fn test_command(&self, watch: &WatchConfig) -> CommandLine {
        let mut command = self.test.clone();
        if watch.fail_fast {
            if let Some(flag) = &self.fail_fast_flag {
                command.args.push(flag.clone());
            }
        }
        if watch.html_coverage {
            command.args.push(self.profile_flag.clone());
            command.args.push(self.profile.clone());
        }
        command.args.extend(self.test_args.iter().cloned());
        command
    }

    pub fn cover_command(&self) -> CommandLine {
        self.cover_html.clone()
    }
}

#[cfg(test)]
impl Default for Toolchain {
    fn default() -> Self {
        Self::from_config(&ToolchainConfig::default()).unwrap()
    }
}

/// Which files the loop watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFiles {
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    pub gitignore: bool,
}

impl WatchedFiles {
    fn from_config(config: &FilesConfig) -> Self {
        Self {
            include: config
                .include
                .clone()
                .unwrap_or_else(|| vec!["**/*.go".to_string()]),
            ignore: config.ignore.clone().unwrap_or_default(),
            gitignore: config.gitignore.unwrap_or(true),
        }
    }
}

/// Everything a watch run needs, resolved from flags and the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub watch: WatchConfig,
    pub toolchain: Toolchain,
    pub files: WatchedFiles,
    /// Compiled from `files`, so bad globs fail before the first cycle.
    pub matcher: FileMatcher,
    pub debounce: Duration,
}

impl Settings {
    /// Resolves settings; command-line values take precedence over the file.
    pub fn resolve(flags: WatchConfig, debounce_ms: Option<u64>, config: &Config) -> Result<Self> {
        let toolchain = Toolchain::from_config(&config.toolchain.clone().unwrap_or_default())?;
        let files = WatchedFiles::from_config(&config.watch.clone().unwrap_or_default());
        if files.include.is_empty() {
            bail!("watch.include must list at least one glob");
        }
        let matcher = FileMatcher::new(&files.include, &files.ignore)
            .context("invalid [watch] globs")?;
        let debounce_ms = debounce_ms
            .or(config.debounce_ms)
            .unwrap_or(DEFAULT_DEBOUNCE_MS);
        Ok(Self {
            watch: flags.merged(config),
            toolchain,
            files,
            matcher,
            debounce: Duration::from_millis(debounce_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(command: &CommandLine) -> Vec<String> {
        let mut out = vec![command.program.clone()];
        out.extend(command.args.iter().cloned());
        out
    }

    #[test]
    fn parses_optional_fields() {
        let raw = r#"
html_coverage = true
silent_test = true
debounce_ms = 250

[toolchain]
build = "cargo build"
test = "cargo llvm-cov"
test_args = "--workspace"
fail_fast_flag = "--no-fail-fast"
failure_marker = "FAILED"

[watch]
include = ["**/*.rs"]
ignore = ["target"]
gitignore = false
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.html_coverage, Some(true));
        assert_eq!(config.only_test, None);
        assert_eq!(config.silent_test, Some(true));
        assert_eq!(config.debounce_ms, Some(250));
        let toolchain = config.toolchain.as_ref().unwrap();
        assert_eq!(toolchain.build.as_deref(), Some("cargo build"));
        assert_eq!(toolchain.failure_marker.as_deref(), Some("FAILED"));
        let watch = config.watch.as_ref().unwrap();
        assert_eq!(watch.include.as_deref(), Some(&["**/*.rs".to_string()][..]));
        assert_eq!(watch.gitignore, Some(false));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<Config>("colour = true").is_err());
    }

    #[test]
    fn defaults_target_go_toolchain() {
        let settings = Settings::resolve(WatchConfig::default(), None, &Config::default()).unwrap();
        assert_eq!(settings.watch, WatchConfig::default());
        assert_eq!(settings.debounce, Duration::from_millis(500));
        assert_eq!(words(&settings.toolchain.build_command()), ["go", "install", "./..."]);
        assert_eq!(
            words(&settings.toolchain.cover_command()),
            ["go", "tool", "cover", "-html", "cover.out", "-o", "cover.html"]
        );
        assert_eq!(settings.files.include, vec!["**/*.go".to_string()]);
        assert!(settings.files.gitignore);
    }

    #[test]
    fn test_command_orders_optional_flags() {
        let toolchain = Toolchain::default();
        let plain = toolchain.test_command(&WatchConfig::default());
        assert_eq!(words(&plain), ["go", "test", "-cover", "-covermode", "count", "./..."]);

        let all = toolchain.test_command(&WatchConfig {
            html_coverage: true,
            fail_fast: true,
            ..WatchConfig::default()
        });
        assert_eq!(
            words(&all),
            [
                "go",
                "test",
                "-failfast",
                "-coverprofile",
                "cover.out",
                "-cover",
                "-covermode",
                "count",
                "./..."
            ]
        );
    }

    #[test]
    fn empty_fail_fast_flag_disables_forwarding() {
        let config = Config {
            toolchain: Some(ToolchainConfig {
                fail_fast_flag: Some(String::new()),
                ..ToolchainConfig::default()
            }),
            ..Config::default()
        };
        let settings = Settings::resolve(WatchConfig::default(), None, &config).unwrap();
        let command = settings.toolchain.test_command(&WatchConfig {
            fail_fast: true,
            ..WatchConfig::default()
        });
        assert!(!command.args.contains(&"-failfast".to_string()));
    }

    #[test]
    fn flags_win_over_file() {
        let config = Config {
            only_test: Some(true),
            debounce_ms: Some(900),
            ..Config::default()
        };
        let flags = WatchConfig {
            fail_fast: true,
            ..WatchConfig::default()
        };
        let settings = Settings::resolve(flags, Some(100), &config).unwrap();
        assert!(settings.watch.only_test);
        assert!(settings.watch.fail_fast);
        assert!(!settings.watch.html_coverage);
        assert_eq!(settings.debounce, Duration::from_millis(100));
    }

    #[test]
    fn empty_build_command_is_rejected() {
        let config = Config {
            toolchain: Some(ToolchainConfig {
                build: Some("  ".to_string()),
                ..ToolchainConfig::default()
            }),
            ..Config::default()
        };
        assert!(Settings::resolve(WatchConfig::default(), None, &config).is_err());
    }

    #[test]
    fn malformed_watch_globs_fail_at_resolve() {
        for (include, ignore) in [(vec!["["], vec![]), (vec!["**/*.go"], vec!["a/{b"])] {
            let config = Config {
                watch: Some(FilesConfig {
                    include: Some(include.iter().map(|s| s.to_string()).collect()),
                    ignore: Some(ignore.iter().map(|s| s.to_string()).collect()),
                    gitignore: None,
                }),
                ..Config::default()
            };
            let err = Settings::resolve(WatchConfig::default(), None, &config).unwrap_err();
            assert!(format!("{err:#}").contains("invalid [watch] globs"));
        }
    }

    #[test]
    fn resolved_matcher_follows_watch_globs() {
        let raw = r#"
[watch]
include = ["**/*.rs"]
ignore = ["target"]
"#;
        let config: Config = toml::from_str(raw).unwrap();
        let settings = Settings::resolve(WatchConfig::default(), None, &config).unwrap();
        assert!(settings.matcher.is_watched(Path::new("src/main.rs")));
        assert!(!settings.matcher.is_watched(Path::new("target/debug/build.rs")));
        assert!(!settings.matcher.is_watched(Path::new("main.go")));
    }

    #[test]
    fn report_paths_are_substituted() {
        let config = Config {
            toolchain: Some(ToolchainConfig {
                profile: Some("out dir/c.out".to_string()),
                report: Some("c.html".to_string()),
                ..ToolchainConfig::default()
            }),
            ..Config::default()
        };
        let settings = Settings::resolve(WatchConfig::default(), None, &config).unwrap();
        assert_eq!(
            words(&settings.toolchain.cover_command()),
            ["go", "tool", "cover", "-html", "out dir/c.out", "-o", "c.html"]
        );
    }
}
