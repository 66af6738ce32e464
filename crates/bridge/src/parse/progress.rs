// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::ParserState;

/// Heuristic estimates never claim more than this. Only an explicit marker
/// or a clean exit may report full completion.
pub const HEURISTIC_CAP: u8 = 90;

/// Points per created file, up to `FILE_POINTS_MAX`.
const POINTS_PER_FILE: u32 = 5;
const FILE_POINTS_MAX: u32 = 50;

/// Points for a fully passing test run, scaled by pass ratio.
const TEST_POINTS_MAX: u64 = 40;

/// Estimate completion from observed signals alone.
///
/// Non-decreasing in both the number of created files and the test pass
/// ratio; 0 for an empty state.
pub fn estimate_progress(state: &ParserState) -> u8 {
    let files = u32::try_from(state.files_created()).unwrap_or(u32::MAX);
    let file_points = files.saturating_mul(POINTS_PER_FILE).min(FILE_POINTS_MAX);

    let test_points = if state.tests_total > 0 {
        let passed = u64::from(state.tests_passed.min(state.tests_total));
        (passed * TEST_POINTS_MAX / u64::from(state.tests_total)) as u32
    } else {
        0
    };

    let estimate = file_points.saturating_add(test_points).min(u32::from(HEURISTIC_CAP));
    estimate as u8
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
