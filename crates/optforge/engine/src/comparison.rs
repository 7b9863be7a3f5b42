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

//! Head-to-head toolchain comparison
//!
//! Compiles with both toolchain families at the caller's optimization
//! level and declares a per-metric winner. A toolchain whose measurement
//! fails carries sentinel values; equal values are a tie. Object names
//! are namespaced per toolchain so the two runs share one scratch
//! directory safely.

use crate::context::AnalysisContext;
use crate::metrics::{is_compile_error, parse_count};
use crate::sandbox::SandboxError;
use crate::toolchain;
use crate::workspace::Scratch;
use optforge_common::models::{ComparisonReport, Language, MetricSample, MetricWinner, OptLevel, ToolchainKind};
use std::cmp::Ordering;

/// Run both toolchains once at the given level and compare
pub async fn run_comparison(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    language: Language,
    level: OptLevel,
) -> Result<ComparisonReport, SandboxError> {
    let (gnu, llvm) = tokio::try_join!(
        measure_toolchain(ctx, scratch, ToolchainKind::Gnu, language, level),
        measure_toolchain(ctx, scratch, ToolchainKind::Llvm, language, level),
    )?;

    let speed_winner = winner(gnu.speed_metric, llvm.speed_metric);
    let size_winner = winner(gnu.size_metric, llvm.size_metric);
    let recommendation = recommend(&gnu, &llvm, speed_winner, size_winner);

    Ok(ComparisonReport {
        gnu,
        llvm,
        speed_winner,
        size_winner,
        recommendation,
    })
}

async fn measure_toolchain(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    toolchain: ToolchainKind,
    language: Language,
    level: OptLevel,
) -> Result<MetricSample, SandboxError> {
    let speed_output = ctx
        .dispatch(toolchain::measure_asm_lines(toolchain, language, level), scratch.path())
        .await?;
    // The line counter still prints 0 on an empty pipe when the compiler
    // fails, so a diagnostic in the output overrides the trailing number.
    // The size measurement would hit the same failure and is skipped.
    if is_compile_error(&speed_output) {
        return Ok(MetricSample::failed(toolchain.tag()));
    }

    let object = toolchain::comparison_object_file(toolchain);
    let size_output = ctx
        .dispatch(toolchain::measure_object_size(toolchain, language, level, &object), scratch.path())
        .await?;

    Ok(MetricSample {
        label: toolchain.tag().to_string(),
        speed_metric: parse_count(&speed_output),
        size_metric: parse_count(&size_output),
    })
}

/// Direct integer comparison; equal values always tie
fn winner(gnu: u64, llvm: u64) -> MetricWinner {
    match gnu.cmp(&llvm) {
        Ordering::Less => MetricWinner::Gnu,
        Ordering::Greater => MetricWinner::Llvm,
        Ordering::Equal => MetricWinner::Tie,
    }
}

fn winner_name(winner: MetricWinner) -> &'static str {
    match winner {
        MetricWinner::Gnu => "GNU",
        MetricWinner::Llvm => "LLVM",
        MetricWinner::Tie => "Tie",
    }
}

fn recommend(gnu: &MetricSample, llvm: &MetricSample, speed: MetricWinner, size: MetricWinner) -> String {
    if !gnu.is_measured() && !llvm.is_measured() {
        return "Could not analyze either toolchain.".to_string();
    }
    format!(
        "For Speed: {} ({} lines).\nFor Size: {} ({} bytes).",
        winner_name(speed),
        gnu.speed_metric.min(llvm.speed_metric),
        winner_name(size),
        gnu.size_metric.min(llvm.size_metric),
    )
}
