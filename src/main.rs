//! covwatch: a build/test/coverage watch loop for a terminal pane.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, loads the optional `covwatch.toml`, and hands the resolved
//! settings to the watch loop, which runs until the process is killed.

mod ansi;
mod app;
mod config;
mod logging;
mod output;
mod report;
mod runner;
mod table;
mod viewport;
mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::app::App;
use crate::config::{Config, Settings, WatchConfig};
use crate::runner::ProcessRunner;
use crate::watch::{find_watched_files, NotifyWaiter};

const DEFAULT_CONFIG_FILE: &str = "covwatch.toml";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "covwatch",
    version,
    about = "Rebuild and retest on every save, sized to fit a tmux pane",
    styles = help_styles(),
    color = clap::ColorChoice::Always,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Generate the HTML coverage report after passing tests.
    #[arg(long, short = 'c')]
    html_coverage: bool,
    /// Skip the build step and only run the tests.
    #[arg(long, short = 't')]
    only_test: bool,
    /// Print nothing below the test header when tests pass.
    #[arg(long, short = 's')]
    silent_test: bool,
    /// Stop the test run at the first failure.
    #[arg(long = "ff", short = 'f', visible_alias = "fail-fast")]
    fail_fast: bool,
    /// Delay after a change before the next cycle (ms).
    #[arg(long)]
    debounce_ms: Option<u64>,
    /// Path to covwatch.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ignore any covwatch.toml in the current directory.
    #[arg(long)]
    no_config: bool,
    /// Log debug diagnostics.
    #[arg(long, short = 'v')]
    verbose: bool,
    /// Write diagnostics to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the files whose changes trigger a new cycle.
    Files,
}

impl Cli {
    fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            html_coverage: self.html_coverage,
            only_test: self.only_test,
            silent_test: self.silent_test,
            fail_fast: self.fail_fast,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = load_file_config(&cli)?;
    let settings = Settings::resolve(cli.watch_config(), cli.debounce_ms, &config)?;
    let root = std::env::current_dir().context("failed to resolve current dir")?;

    if let Some(Commands::Files) = cli.command {
        for path in find_watched_files(&root, &settings.matcher, settings.files.gitignore)? {
            let shown = path.strip_prefix(&root).unwrap_or(&path);
            println!("{}", shown.display());
        }
        return Ok(());
    }

    info!(watch = ?settings.watch, root = %root.display(), "starting watch loop");
    let session = viewport::detect_session();
    let mut app = App::new(
        settings,
        root,
        ProcessRunner,
        session,
        NotifyWaiter,
        std::io::stdout(),
    );
    app.run().await
}

fn load_file_config(cli: &Cli) -> Result<Config> {
    if cli.no_config {
        return Ok(Config::default());
    }
    let config_path = cli.config.clone().or_else(default_config_path);
    match config_path {
        Some(path) => config::load_config(&path),
        None => Ok(Config::default()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}
