// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer input filtering.
//!
//! When the agent's own TUI enables mouse or focus reporting, the viewer's
//! terminal emulator answers with escape sequences that arrive on the same
//! channel as keystrokes. None of them are keyboard input, so they are
//! stripped before anything is written to the agent's PTY:
//!
//! - SGR (1006) mouse reports: `ESC [ < button ; col ; row (M|m)`
//! - legacy X10 mouse reports: `ESC [ M` followed by three raw characters
//! - focus in/out (1004): `ESC [ I` / `ESC [ O`

const ESC: char = '\x1b';

/// Strip mouse and focus reports from viewer input.
///
/// Characters are pushed onto the output one at a time and the output's tail
/// is checked for a completed report after each push. A report spliced
/// together by an earlier removal is therefore caught too, the result never
/// contains a report, and `filter_input(filter_input(s))` equals
/// `filter_input(s)`. Work is linear in the input length.
pub fn filter_input(raw: &str) -> String {
    let mut out: Vec<char> = Vec::with_capacity(raw.len());
    for c in raw.chars() {
        out.push(c);
        if let Some(n) = report_tail_len(&out) {
            out.truncate(out.len() - n);
        }
    }
    out.into_iter().collect()
}

/// Length in chars of the report ending at the last char of `s`, if any.
///
/// When several shapes end here the one starting earliest wins.
fn report_tail_len(s: &[char]) -> Option<usize> {
    let n = s.len();
    match s.last() {
        Some('M' | 'm') => {
            if let Some(len) = sgr_mouse_tail_len(s) {
                return Some(len);
            }
        }
        Some('I' | 'O') => {
            if n >= 3 && s[n - 3] == ESC && s[n - 2] == '[' && !is_legacy_tail(s) {
                return Some(3);
            }
        }
        _ => {}
    }
    is_legacy_tail(s).then_some(6)
}

/// `ESC [ M` followed by three raw characters.
fn is_legacy_tail(s: &[char]) -> bool {
    let n = s.len();
    n >= 6 && s[n - 6] == ESC && s[n - 5] == '[' && s[n - 4] == 'M'
}

/// `ESC [ <` then three `;`-separated decimal fields and a final `M`/`m`.
fn sgr_mouse_tail_len(s: &[char]) -> Option<usize> {
    // Index one past the char under inspection, walking backwards.
    let mut i = s.len().checked_sub(1)?;
    for field in 0..3 {
        let end = i;
        while i > 0 && s[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i == end || i == 0 {
            return None;
        }
        let want = if field < 2 { ';' } else { '<' };
        if s[i - 1] != want {
            return None;
        }
        i -= 1;
    }
    if i >= 2 && s[i - 2] == ESC && s[i - 1] == '[' {
        Some(s.len() - (i - 2))
    } else {
        None
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
