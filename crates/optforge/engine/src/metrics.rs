// Optforge
// Copyright (C) 2025 Optforge Contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Numeric metric extraction from heterogeneous tool output

use optforge_common::METRIC_SENTINEL;

/// Marker that distinguishes a compiler diagnostic from ordinary output
pub const DIAGNOSTIC_MARKER: &str = "error:";

/// Strictly parse the trimmed final line of tool output as a count.
///
/// Measurement commands print their number last; anything before it
/// (warnings, progress noise) is ignored. A failed parse returns the
/// catastrophic sentinel so the configuration can never win a
/// smaller-is-better comparison.
pub fn parse_count(text: &str) -> u64 {
    text.trim()
        .lines()
        .last()
        .and_then(|line| line.trim().parse::<u64>().ok())
        .unwrap_or(METRIC_SENTINEL)
}

/// Sum every parseable `<name> : <count>` row of the opcode-counter
/// plugin's output. Separator rows, per-function headers and any other
/// unparsable lines are skipped silently; they are formatting, not data.
pub fn parse_opcode_total(text: &str) -> u64 {
    text.lines()
        .filter_map(|line| {
            let (name, count) = line.split_once(':')?;
            if name.trim().is_empty() {
                return None;
            }
            count.trim().parse::<u64>().ok()
        })
        .sum()
}

/// True when tool output carries a compiler diagnostic
pub fn is_compile_error(output: &str) -> bool {
    output.contains(DIAGNOSTIC_MARKER)
}
