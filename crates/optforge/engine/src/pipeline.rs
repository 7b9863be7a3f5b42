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

//! Incremental pass pipeline
//!
//! Applies a validated, ordered sequence of IR passes one at a time,
//! tracking the instruction-count delta of every step. Unlike the
//! fail-soft sweep, the pipeline is fail-fast: a step that produces
//! diagnostic output or no artifact aborts the whole run and discards
//! partial results. The asymmetry is deliberate: a sweep level is an
//! independent measurement, while a pipeline step feeds the next one.

use crate::cfg;
use crate::context::AnalysisContext;
use crate::error::EngineError;
use crate::metrics::{is_compile_error, parse_opcode_total};
use crate::passes::PassId;
use crate::toolchain;
use crate::workspace::Scratch;
use optforge_common::models::{GraphArtifact, Language, OptLevel, PassStep, PipelineReport};
use tracing::{debug, info};

/// Everything one successful pipeline run produces
pub struct PipelineOutcome {
    pub report: PipelineReport,
    pub transformed_ir: String,
    pub graph: GraphArtifact,
}

/// Run the pass pipeline over freshly compiled baseline IR.
///
/// With zero passes the baseline IR is returned unchanged and the step
/// table is empty.
pub async fn run_pass_pipeline(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    language: Language,
    level: OptLevel,
    passes: &[PassId],
    opcode_detail: bool,
) -> Result<PipelineOutcome, EngineError> {
    // Step 0: baseline IR, with optnone annotations disabled so the
    // requested passes are not silently skipped.
    let baseline_file = toolchain::pipeline_ir_file(0);
    let compile_output = ctx
        .dispatch(toolchain::emit_baseline_ir(language, level, &baseline_file), scratch.path())
        .await
        .map_err(EngineError::from)?;
    if is_compile_error(&compile_output) {
        return Err(EngineError::StepFailed {
            pass: "baseline".to_string(),
            detail: compile_output,
        });
    }
    if !scratch.contains(&baseline_file) {
        return Err(EngineError::ArtifactMissing { path: baseline_file });
    }

    let (baseline_count, mut counter_output) = count_instructions(ctx, scratch, &baseline_file, "baseline").await?;
    info!(baseline_count, passes = passes.len(), "pipeline baseline established");

    let mut steps = Vec::with_capacity(passes.len());
    let mut current_file = baseline_file;
    let mut previous_count = baseline_count;

    for (index, &pass) in passes.iter().enumerate() {
        let next_file = toolchain::pipeline_ir_file(index + 1);

        let pass_output = ctx
            .dispatch(toolchain::apply_pass(pass, &current_file, &next_file), scratch.path())
            .await
            .map_err(EngineError::from)?;
        if is_compile_error(&pass_output) {
            return Err(EngineError::StepFailed {
                pass: pass.to_string(),
                detail: pass_output,
            });
        }
        if !scratch.contains(&next_file) {
            return Err(EngineError::ArtifactMissing { path: next_file });
        }

        let (count, raw) = count_instructions(ctx, scratch, &next_file, pass.as_str()).await?;
        counter_output = raw;

        let delta = previous_count as i64 - count as i64;
        debug!(pass = pass.as_str(), count, delta, "pipeline step complete");
        steps.push(PassStep {
            pass: pass.to_string(),
            instruction_count: count,
            delta,
        });

        previous_count = count;
        current_file = next_file;
    }

    let final_count = previous_count;
    let reduction = baseline_count as i64 - final_count as i64;
    let reduction_percent = if baseline_count > 0 {
        reduction as f64 * 100.0 / baseline_count as f64
    } else {
        0.0
    };

    let transformed_ir = scratch.read_artifact(&current_file)?;

    // CFG of the final transformed IR, through the same fallback chain
    // as the primary graph phase, rooted on the final artifact.
    let generator_output = ctx
        .dispatch(toolchain::generate_cfg(&current_file), scratch.path())
        .await
        .map_err(EngineError::from)?;
    let graph = cfg::maybe_render(ctx, scratch, cfg::discover_graph(scratch, cfg::ENTRY_FUNCTION, &generator_output)).await;

    let report = PipelineReport {
        baseline_count,
        steps,
        final_count,
        reduction,
        reduction_percent,
        opcode_detail: opcode_detail.then_some(counter_output),
    };

    Ok(PipelineOutcome {
        report,
        transformed_ir,
        graph,
    })
}

async fn count_instructions(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    file: &str,
    step: &str,
) -> Result<(u64, String), EngineError> {
    let output = ctx
        .dispatch(
            toolchain::count_opcodes(&ctx.config().opcode_plugin_path, file),
            scratch.path(),
        )
        .await
        .map_err(EngineError::from)?;
    if is_compile_error(&output) {
        return Err(EngineError::StepFailed {
            pass: step.to_string(),
            detail: output,
        });
    }
    Ok((parse_opcode_total(&output), output))
}

/// Plain-text rendering of a pipeline report
pub fn format_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Baseline instruction count: {}\n", report.baseline_count));

    if !report.steps.is_empty() {
        out.push_str(&format!("\n{:<16}{:>10}{:>10}\n", "Pass", "Count", "Delta"));
        for step in &report.steps {
            out.push_str(&format!("{:<16}{:>10}{:>10}\n", step.pass, step.instruction_count, step.delta));
        }
    }

    out.push_str(&format!(
        "\nFinal count: {} (reduction {}, {:.1}%)\n",
        report.final_count, report.reduction, report.reduction_percent
    ));
    out
}
