//! Watched file discovery and change notification.
//!
//! Each cycle re-enumerates the source files under the working directory and
//! then blocks until one of them is written. Files are matched with glob
//! patterns and, optionally, `.gitignore` rules.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Selects watched files by include and ignore globs.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    include: GlobSet,
    ignore: Option<GlobSet>,
}

impl FileMatcher {
    pub fn new(include: &[String], ignore: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in include {
            builder.add(
                Glob::new(pattern).with_context(|| format!("invalid include glob {pattern:?}"))?,
            );
        }
        let include = builder.build()?;

        let ignore = if ignore.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in ignore {
                for expanded in expand_pattern(pattern) {
                    builder.add(
                        Glob::new(&expanded)
                            .with_context(|| format!("invalid ignore glob {pattern:?}"))?,
                    );
                }
            }
            Some(builder.build()?)
        };

        Ok(Self { include, ignore })
    }

    /// Whether `relative` (a path relative to the walk root) is watched.
    pub fn is_watched(&self, relative: &Path) -> bool {
        if let Some(ignore) = &self.ignore {
            if ignore.is_match(relative) {
                return false;
            }
        }
        self.include.is_match(relative)
    }
}

fn expand_pattern(pattern: &str) -> Vec<String> {
    let trimmed = pattern.trim_end_matches('/');
    let has_glob = pattern.contains('*') || pattern.contains('?') || pattern.contains('[');
    if has_glob {
        vec![pattern.to_string()]
    } else {
        vec![trimmed.to_string(), format!("{}/**", trimmed)]
    }
}

/// Lists every file below `root` selected by `matcher`, sorted.
///
/// With `gitignore` set, `.gitignore`, `.ignore` and git exclude rules prune the walk.
pub fn find_watched_files(
    root: &Path,
    matcher: &FileMatcher,
    gitignore: bool,
) -> Result<Vec<PathBuf>> {
    let mut walker = WalkBuilder::new(root);
    walker
        .hidden(true)
        .git_ignore(gitignore)
        .git_exclude(gitignore)
        .git_global(gitignore)
        .ignore(gitignore)
        .parents(gitignore)
        .require_git(false);

    let mut found = Vec::new();
    for entry in walker.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if matcher.is_watched(relative) {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    debug!(count = found.len(), root = %root.display(), "enumerated watched files");
    Ok(found)
}

/// Blocks until one of a set of files changes.
pub trait ChangeWaiter {
    /// Returns once any of `paths` has been written. With no paths this never returns.
    async fn wait_for_change(&mut self, paths: &[PathBuf]) -> Result<()>;
}

/// Waits on native filesystem notifications.
#[derive(Debug, Default)]
pub struct NotifyWaiter;

impl ChangeWaiter for NotifyWaiter {
    async fn wait_for_change(&mut self, paths: &[PathBuf]) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(64);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            notify::Config::default(),
        )
        .context("failed to create watcher")?;

        let mut watched = 0usize;
        for path in paths {
            // A file removed since enumeration is simply skipped.
            match watcher.watch(path, RecursiveMode::NonRecursive) {
                Ok(()) => watched += 1,
                Err(err) => warn!(path = %path.display(), error = %err, "cannot watch file"),
            }
        }
        if watched == 0 {
            warn!("no files to watch; waiting indefinitely");
        }

        while let Some(event) = rx.recv().await {
            match event {
                Ok(event) if is_change(&event) => {
                    debug!(paths = ?event.paths, kind = ?event.kind, "change detected");
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "watch error"),
            }
        }
        // The sender lives inside the watcher, which outlives the loop above.
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Whether the platform watcher reports a writer closing its file.
const CLOSE_EVENTS: bool = cfg!(any(target_os = "linux", target_os = "android"));

/// A save is a close-after-write, or a rename, creation or removal for editors
/// that replace the file. Plain writes count only where no close event follows.
fn is_change(event: &NotifyEvent) -> bool {
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Create(_)
        | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            !CLOSE_EVENTS
        }
        _ => false,
    }
}
