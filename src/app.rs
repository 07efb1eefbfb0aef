//! The watch loop.
//!
//! `App` ties the pieces together: every cycle clears the screen, composes a
//! fresh report, prints it, fits the pane to it and then waits for a watched
//! file to change.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};
use tracing::{debug, info};

use crate::config::Settings;
use crate::output::{OutputBuffer, WAIT_HEADER};
use crate::report::compose;
use crate::runner::CommandRunner;
use crate::viewport::{resize_to_fit, TerminalSession};
use crate::watch::{find_watched_files, ChangeWaiter};

/// Summary of one finished cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Whether build and tests passed.
    pub success: bool,
    /// Rows reserved for the rendered report.
    pub line_count: usize,
    /// Height applied to the pane.
    pub pane_height: usize,
    /// Number of files waited on.
    pub watched: usize,
}

/// Owns the collaborators of the watch loop.
pub struct App<R, S, W, O> {
    settings: Settings,
    root: PathBuf,
    runner: R,
    session: S,
    waiter: W,
    out: O,
}

impl<R, S, W, O> App<R, S, W, O>
where
    R: CommandRunner,
    S: TerminalSession,
    W: ChangeWaiter,
    O: Write,
{
    pub fn new(
        settings: Settings,
        root: PathBuf,
        runner: R,
        session: S,
        waiter: W,
        out: O,
    ) -> Self {
        Self {
            settings,
            root,
            runner,
            session,
            waiter,
            out,
        }
    }

    /// Runs cycles until an error stops the loop.
    pub async fn run(&mut self) -> Result<()> {
        let mut cycle = 0u64;
        loop {
            cycle += 1;
            let report = self.cycle().await?;
            debug!(
                cycle,
                success = report.success,
                lines = report.line_count,
                height = report.pane_height,
                watched = report.watched,
                "cycle finished"
            );
        }
    }

    /// Runs one full cycle, returning after the change wait and debounce.
    pub async fn cycle(&mut self) -> Result<CycleReport> {
        crossterm::execute!(
            self.out,
            Clear(ClearType::All),
            Clear(ClearType::Purge),
            MoveTo(0, 0)
        )
        .context("failed to clear screen")?;

        let mut buffer = OutputBuffer::new();
        let success = compose(
            &self.settings.watch,
            &self.settings.toolchain,
            &mut self.runner,
            &mut buffer,
        )
        .await?;
        buffer.add_newline();
        buffer.header(WAIT_HEADER);

        let (text, line_count) = buffer.render();
        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .context("failed to write report")?;

        let files = find_watched_files(
            &self.root,
            &self.settings.matcher,
            self.settings.files.gitignore,
        )?;
        let pane_height = resize_to_fit(&self.session, line_count).await?;
        info!(success, pane_height, "waiting for changes");

        self.waiter.wait_for_change(&files).await?;
        tokio::time::sleep(self.settings.debounce).await;

        Ok(CycleReport {
            success,
            line_count,
            pane_height,
            watched: files.len(),
        })
    }
}
