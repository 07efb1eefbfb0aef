//! Composition of one cycle's build and test report.
//!
//! The composer runs the build, the tests and the optional coverage report in
//! that order and decides what each step contributes to the `OutputBuffer`.

use anyhow::Result;
use tracing::{debug, info};

use crate::ansi::colorize_error;
use crate::config::{Toolchain, WatchConfig};
use crate::output::{OutputBuffer, BUILD_HEADER, TEST_HEADER};
use crate::runner::{CommandLine, CommandResult, CommandRunner};
use crate::table::format_table;

/// What happens to a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Appended to the buffer as-is.
    Stream,
    /// Handed back to the caller untouched.
    Return,
}

/// Runs `command` once and routes its output according to `capture`.
pub async fn execute<R: CommandRunner>(
    runner: &mut R,
    buffer: &mut OutputBuffer,
    command: &CommandLine,
    capture: Capture,
) -> Result<CommandResult> {
    let output = runner.run(command).await?;
    let captured_text = match capture {
        Capture::Stream => {
            append_block(buffer, &output.text);
            None
        }
        Capture::Return => Some(output.text),
    };
    Ok(CommandResult {
        success: output.success,
        captured_text,
    })
}

/// Builds and tests the project, writing the report into `buffer`.
///
/// Returns whether the build (when run) and the tests both passed. A failing
/// build skips the tests. The coverage report is best-effort and never changes
/// the result.
pub async fn compose<R: CommandRunner>(
    watch: &WatchConfig,
    toolchain: &Toolchain,
    runner: &mut R,
    buffer: &mut OutputBuffer,
) -> Result<bool> {
    if !watch.only_test {
        buffer.header(BUILD_HEADER);
        let build = execute(runner, buffer, &toolchain.build_command(), Capture::Stream).await?;
        if !build.success {
            info!("build failed");
            return Ok(false);
        }
        buffer.add_newline();
    }

    buffer.header(TEST_HEADER);
    let test = execute(
        runner,
        buffer,
        &toolchain.test_command(watch),
        Capture::Return,
    )
    .await?;
    let text = test.captured_text.unwrap_or_default();
    if !test.success {
        info!("tests failed");
        append_block(buffer, &colorize_error(&text, &toolchain.failure_marker));
        return Ok(false);
    }

    if !watch.silent_test {
        append_block(buffer, &format_table(&text, &toolchain.detail_prefix));
    }

    if watch.html_coverage {
        let cover = execute(runner, buffer, &toolchain.cover_command(), Capture::Stream).await?;
        debug!(success = cover.success, report = %toolchain.report, "coverage report generated");
    }
    Ok(true)
}

// Appends captured text so that it always ends on a complete line.
fn append_block(buffer: &mut OutputBuffer, text: &str) {
    if text.is_empty() {
        return;
    }
    buffer.append(text, !text.ends_with('\n'));
}
