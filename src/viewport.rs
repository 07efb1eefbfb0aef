//! Pane sizing.
//!
//! After each render the pane running covwatch is resized to the report's
//! height, capped at half of the window so the neighbouring pane keeps the
//! other half.

use std::process::{Output, Stdio};

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, warn};

/// Geometry sampled once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportGeometry {
    pub pane_total_height: usize,
    pub rendered_line_count: usize,
}

impl ViewportGeometry {
    /// Rows the pane should occupy: the report height, at most half the window.
    pub fn target_height(&self) -> usize {
        (self.pane_total_height / 2).min(self.rendered_line_count)
    }
}

/// Parses a window height reported by the terminal session.
///
/// Anything but decimal digits (a trailing line break aside) means the session
/// answered in an unexpected shape and is an error.
pub fn parse_height(raw: &str) -> Result<usize> {
    let digits = raw.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("terminal reported a malformed window height: {raw:?}");
    }
    digits
        .parse()
        .with_context(|| format!("window height out of range: {digits}"))
}

/// Computes the pane height for a window of `window_height` rows.
pub fn compute_height(window_height: &str, rendered_line_count: usize) -> Result<usize> {
    let geometry = ViewportGeometry {
        pane_total_height: parse_height(window_height)?,
        rendered_line_count,
    };
    Ok(geometry.target_height())
}

/// Access to the terminal window hosting the report.
pub trait TerminalSession {
    /// Total height of the containing window, as printed by the terminal.
    async fn window_height(&self) -> Result<String>;
    /// Resizes the report pane to `height` rows.
    async fn resize_pane(&self, height: usize) -> Result<()>;
}

/// Resizes the pane to fit `rendered_line_count` rows and returns the height applied.
pub async fn resize_to_fit<S: TerminalSession>(
    session: &S,
    rendered_line_count: usize,
) -> Result<usize> {
    let raw = session.window_height().await?;
    let height = compute_height(&raw, rendered_line_count)?;
    debug!(window = raw.trim_end(), lines = rendered_line_count, height, "resizing pane");
    session.resize_pane(height).await?;
    Ok(height)
}

/// A pane inside a tmux window.
#[derive(Debug, Clone)]
pub struct TmuxSession {
    program: String,
    pane: Option<String>,
}

impl TmuxSession {
    pub fn new(pane: Option<String>) -> Self {
        Self {
            program: "tmux".to_string(),
            pane,
        }
    }

    fn target_args(&self) -> Vec<String> {
        match &self.pane {
            Some(pane) => vec!["-t".to_string(), pane.clone()],
            None => Vec::new(),
        }
    }

    async fn tmux(&self, subcommand: &str, args: &[String]) -> Result<Output> {
        Command::new(&self.program)
            .arg(subcommand)
            .args(self.target_args())
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {} {subcommand}", self.program))
    }
}

impl TerminalSession for TmuxSession {
    async fn window_height(&self) -> Result<String> {
        let args = ["-p".to_string(), "#{window_height}".to_string()];
        let output = self.tmux("display-message", &args).await?;
        if !output.status.success() {
            bail!(
                "tmux display-message failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn resize_pane(&self, height: usize) -> Result<()> {
        let args = ["-y".to_string(), height.to_string()];
        let output = self.tmux("resize-pane", &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stderr = %stderr.trim(), height, "tmux resize-pane failed");
        }
        Ok(())
    }
}

/// A plain terminal without a multiplexer: height is readable, resizing is not.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSession;

impl TerminalSession for DetachedSession {
    async fn window_height(&self) -> Result<String> {
        let (_, rows) = crossterm::terminal::size().context("failed to read terminal size")?;
        Ok(rows.to_string())
    }

    async fn resize_pane(&self, _height: usize) -> Result<()> {
        Ok(())
    }
}

/// The session covwatch runs in.
#[derive(Debug, Clone)]
pub enum Session {
    Tmux(TmuxSession),
    Detached(DetachedSession),
}

impl TerminalSession for Session {
    async fn window_height(&self) -> Result<String> {
        match self {
            Session::Tmux(session) => session.window_height().await,
            Session::Detached(session) => session.window_height().await,
        }
    }

    async fn resize_pane(&self, height: usize) -> Result<()> {
        match self {
            Session::Tmux(session) => session.resize_pane(height).await,
            Session::Detached(session) => session.resize_pane(height).await,
        }
    }
}

/// Picks the tmux session when running inside tmux, the detached one otherwise.
pub fn detect_session() -> Session {
    if std::env::var_os("TMUX").is_some() {
        let pane = std::env::var("TMUX_PANE").ok().filter(|p| !p.is_empty());
        debug!(pane = ?pane, "using tmux session");
        Session::Tmux(TmuxSession::new(pane))
    } else {
        warn!("not running inside tmux; the pane will not be resized");
        Session::Detached(DetachedSession)
    }
}
