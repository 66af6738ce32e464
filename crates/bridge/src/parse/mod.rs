// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heuristic extraction of structured progress signals from raw agent output.
//!
//! Agents print free-form text. [`OutputParser`] scans each chunk line by line
//! and emits a [`SemanticEvent`] for every marker it recognises, updating the
//! per-session [`ParserState`] as it goes. Detectors are independent: one line
//! may yield several events, and a chunk that matches nothing yields none.

pub mod progress;

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use progress::{estimate_progress, HEURISTIC_CAP};

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Created,
    Modified,
    Deleted,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Where a progress value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSource {
    /// The agent printed a percentage.
    Explicit,
    /// Derived by [`estimate_progress`].
    Estimated,
}

/// One signal recognised in agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SemanticEvent {
    Progress { value: u8, source: ProgressSource },
    File { action: FileAction, path: String },
    Test { passed: u32, failed: u32, total: u32 },
    Error { message: String, severity: Severity },
    Exit { code: i32 },
}

/// Aggregate counters for one observed agent session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    pub created: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub tests_total: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Last progress value reported to viewers, explicit or estimated.
    pub progress: u8,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_created(&self) -> usize {
        self.created.len()
    }

    pub fn files_modified(&self) -> usize {
        self.modified.len()
    }

    pub fn files_deleted(&self) -> usize {
        self.deleted.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn record_file(&mut self, action: FileAction, path: &str) {
        let set = match action {
            FileAction::Created => &mut self.created,
            FileAction::Modified => &mut self.modified,
            FileAction::Deleted => &mut self.deleted,
        };
        set.insert(path.to_owned());
    }
}

/// Compiled detectors for agent output.
pub struct OutputParser {
    ansi: Regex,
    progress: Vec<Regex>,
    files: Vec<(FileAction, Regex)>,
    tests_failed_first: Regex,
    tests_passed_first: Regex,
    error: Regex,
    warning: Regex,
    exit: Regex,
}

impl std::fmt::Debug for OutputParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputParser")
            .field("progress", &self.progress.len())
            .field("files", &self.files.len())
            .finish()
    }
}

impl OutputParser {
    pub fn new() -> anyhow::Result<Self> {
        let ansi = Regex::new(
            r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[()][0-9A-Za-z]",
        )?;

        let progress = vec![
            Regex::new(r"(?i)\b(?:progress|complete|completed)\b\D{0,16}?(\d{1,3})\s*%")?,
            Regex::new(r"(?i)(?:^|[^\d.])(\d{1,3})\s*%\s*(?:complete|completed|done|progress)\b")?,
        ];

        // First match per action wins, so specific phrasings come first.
        let files = vec![
            (FileAction::Created, Regex::new(r"Created file:\s*(\S+)")?),
            (FileAction::Created, Regex::new(r"Writing to\s+(\S+)")?),
            (FileAction::Created, Regex::new(r"[✓✔]\s*Created(?:\s+file:?)?\s+(\S+)")?),
            (FileAction::Modified, Regex::new(r"Modified:\s*(\S+)")?),
            (FileAction::Modified, Regex::new(r"\bUpdated(?:\s+file:?)?\s+(\S+)")?),
            (FileAction::Deleted, Regex::new(r"Deleted:\s*(\S+)")?),
            (FileAction::Deleted, Regex::new(r"\bRemoved(?:\s+file:?)?\s+(\S+)")?),
        ];

        Ok(Self {
            ansi,
            progress,
            files,
            tests_failed_first: Regex::new(r"(?i)(\d+)\s+failed[,;]?\s+(\d+)\s+passed")?,
            tests_passed_first: Regex::new(r"(?i)(\d+)\s+passed(?:[,;]?\s+(\d+)\s+failed)?")?,
            error: Regex::new(r"(?i)^\s*error:\s*(.*)$")?,
            warning: Regex::new(r"(?i)^\s*warning:\s*(.*)$")?,
            exit: Regex::new(r"(?i)exited with (?:exit )?code:?\s*(-?\d+)")?,
        })
    }

    /// Scan one chunk of output, updating `state` and returning the events
    /// found, in the order they appear in the text.
    pub fn parse(&self, chunk: &str, state: &mut ParserState) -> Vec<SemanticEvent> {
        let clean = self.ansi.replace_all(chunk, "");
        let mut events = Vec::new();
        for line in clean.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let mut found = self.scan_line(line);
            found.sort_by_key(|(pos, _)| *pos);
            for (_, event) in found {
                apply(&event, state);
                events.push(event);
            }
        }
        events
    }

    fn scan_line(&self, line: &str) -> Vec<(usize, SemanticEvent)> {
        let mut found = Vec::new();

        if let Some((pos, value)) = self.explicit_progress(line) {
            found.push((pos, SemanticEvent::Progress { value, source: ProgressSource::Explicit }));
        }

        let mut seen = Vec::with_capacity(3);
        for (action, re) in &self.files {
            if seen.contains(action) {
                continue;
            }
            let Some(caps) = re.captures(line) else { continue };
            let (Some(whole), Some(raw)) = (caps.get(0), caps.get(1)) else { continue };
            let path = clean_path(raw.as_str());
            if path.is_empty() {
                continue;
            }
            seen.push(*action);
            found.push((whole.start(), SemanticEvent::File { action: *action, path }));
        }

        if let Some((pos, passed, failed)) = self.test_summary(line) {
            let total = passed.saturating_add(failed);
            found.push((pos, SemanticEvent::Test { passed, failed, total }));
        }

        if let Some(message) = capture_rest(&self.error, line) {
            found.push((0, SemanticEvent::Error { message, severity: Severity::Error }));
        } else if let Some(message) = capture_rest(&self.warning, line) {
            found.push((0, SemanticEvent::Error { message, severity: Severity::Warning }));
        }

        if let Some(caps) = self.exit.captures(line) {
            let code = caps.get(1).and_then(|m| m.as_str().parse().ok());
            if let (Some(whole), Some(code)) = (caps.get(0), code) {
                found.push((whole.start(), SemanticEvent::Exit { code }));
            }
        }

        found
    }

    fn explicit_progress(&self, line: &str) -> Option<(usize, u8)> {
        self.progress
            .iter()
            .filter_map(|re| {
                let caps = re.captures(line)?;
                let value: u8 = caps.get(1)?.as_str().parse().ok()?;
                (value <= 100).then(|| (caps.get(0).map_or(0, |m| m.start()), value))
            })
            .min_by_key(|(pos, _)| *pos)
    }

    fn test_summary(&self, line: &str) -> Option<(usize, u32, u32)> {
        if let Some(caps) = self.tests_failed_first.captures(line) {
            let failed = caps.get(1)?.as_str().parse().ok()?;
            let passed = caps.get(2)?.as_str().parse().ok()?;
            return Some((caps.get(0)?.start(), passed, failed));
        }
        let caps = self.tests_passed_first.captures(line)?;
        let passed = caps.get(1)?.as_str().parse().ok()?;
        let failed = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some((caps.get(0)?.start(), passed, failed))
    }
}

fn apply(event: &SemanticEvent, state: &mut ParserState) {
    match event {
        SemanticEvent::Progress { value, .. } => state.progress = *value,
        SemanticEvent::File { action, path } => state.record_file(*action, path),
        SemanticEvent::Test { passed, failed, total } => {
            state.tests_passed = *passed;
            state.tests_failed = *failed;
            state.tests_total = *total;
        }
        SemanticEvent::Error { message, severity: Severity::Error } => {
            state.errors.push(message.clone())
        }
        SemanticEvent::Error { message, severity: Severity::Warning } => {
            state.warnings.push(message.clone())
        }
        SemanticEvent::Exit { code: 0 } => state.progress = 100,
        SemanticEvent::Exit { .. } => {}
    }
}

/// The text after an `Error:`/`Warning:` prefix, or the whole line when the
/// prefix stands alone.
fn capture_rest(re: &Regex, line: &str) -> Option<String> {
    let caps = re.captures(line)?;
    let rest = caps.get(1).map_or("", |m| m.as_str()).trim();
    Some(if rest.is_empty() { line.trim().to_owned() } else { rest.to_owned() })
}

fn clean_path(raw: &str) -> String {
    raw.trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | ')'))
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .to_owned()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
