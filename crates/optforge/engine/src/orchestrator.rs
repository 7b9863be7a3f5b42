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

//! Per-request composition of the analysis phases
//!
//! The primary job always runs first. If it surfaces a compiler
//! diagnostic the whole request short-circuits after that single sandbox
//! invocation and the remaining phases are explicitly marked skipped.
//! Otherwise sweep, comparison and CFG extraction run concurrently over
//! the request's scratch directory and are merged into one response.

use crate::cfg;
use crate::comparison;
use crate::context::AnalysisContext;
use crate::error::EngineError;
use crate::metrics::is_compile_error;
use crate::passes::validate_passes;
use crate::pipeline::{self, format_report};
use crate::sandbox::Sandbox;
use crate::sweep;
use crate::toolchain;
use crate::workspace::Scratch;
use optforge_common::models::{
    CompileRequest, CompileResponse, GraphArtifact, OutputKind, PhaseResult, PipelineRequest, PipelineResponse,
};
use optforge_common::EngineConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives all analysis phases for inbound requests.
///
/// The sandbox executor is injected so every component below it can be
/// exercised against a test double.
pub struct Orchestrator {
    ctx: AnalysisContext,
}

impl Orchestrator {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: EngineConfig) -> Self {
        Self {
            ctx: AnalysisContext::new(sandbox, config),
        }
    }

    /// Handle a compile-and-analyze request.
    ///
    /// Tool-level failures come back inside the response envelope; only
    /// a sandbox infrastructure failure returns `Err`.
    pub async fn compile(&self, request: &CompileRequest) -> Result<CompileResponse, EngineError> {
        let scratch = Scratch::new()?;
        scratch.write_source(request.language, &request.source)?;
        scratch.write_stdin(request.stdin.as_deref().unwrap_or(""))?;

        info!(output = ?request.output, toolchain = ?request.toolchain, "running primary job");
        let (primary_output, primary_graph) = self.run_primary(request, &scratch).await?;

        if is_compile_error(&primary_output) {
            warn!("primary compile failed, skipping analysis phases");
            return Ok(CompileResponse {
                output: String::new(),
                error: Some(primary_output),
                sweep: PhaseResult::Skipped,
                comparison: PhaseResult::Skipped,
                graph: PhaseResult::Skipped,
            });
        }

        // No data dependency between the phases; only the sandbox pool
        // bounds them.
        let (sweep_report, comparison_report, graph_artifact) = match primary_graph {
            Some(artifact) => {
                let (sweep_report, comparison_report) = tokio::try_join!(
                    sweep::run_sweep(&self.ctx, &scratch, request.toolchain, request.language),
                    comparison::run_comparison(&self.ctx, &scratch, request.language, request.optimization),
                )?;
                (sweep_report, comparison_report, artifact)
            }
            None => tokio::try_join!(
                sweep::run_sweep(&self.ctx, &scratch, request.toolchain, request.language),
                comparison::run_comparison(&self.ctx, &scratch, request.language, request.optimization),
                cfg::extract_cfg(&self.ctx, &scratch, request.toolchain, request.language, request.optimization),
            )?,
        };

        Ok(CompileResponse {
            output: primary_output,
            error: None,
            sweep: PhaseResult::Completed(sweep_report),
            comparison: PhaseResult::Completed(comparison_report),
            graph: PhaseResult::Completed(graph_artifact),
        })
    }

    async fn run_primary(
        &self,
        request: &CompileRequest,
        scratch: &Scratch,
    ) -> Result<(String, Option<GraphArtifact>), EngineError> {
        let output = match request.output {
            OutputKind::Run => {
                let command = toolchain::build_and_run(
                    request.toolchain,
                    request.language,
                    request.optimization,
                    self.ctx.config().run_timeout_secs,
                );
                self.ctx.dispatch(command, scratch.path()).await?
            }
            OutputKind::Asm => {
                let command = toolchain::emit_asm(request.toolchain, request.language, request.optimization);
                self.ctx.dispatch(command, scratch.path()).await?
            }
            OutputKind::Ir => {
                let command = toolchain::emit_ir(request.toolchain, request.language, request.optimization);
                self.ctx.dispatch(command, scratch.path()).await?
            }
            OutputKind::Graph => {
                let artifact =
                    cfg::extract_cfg(&self.ctx, scratch, request.toolchain, request.language, request.optimization).await?;
                let text = match &artifact {
                    GraphArtifact::Canonical { dot, .. } | GraphArtifact::FallbackConcatenated { dot, .. } => dot.clone(),
                    GraphArtifact::NotFound { diagnostic } => diagnostic.clone(),
                    GraphArtifact::Unsupported { reason } => reason.clone(),
                };
                return Ok((text, Some(artifact)));
            }
        };
        Ok((output, None))
    }

    /// Handle a pass-pipeline request.
    ///
    /// Pass identifiers are validated against the allow-list before any
    /// sandbox invocation; the pipeline itself is fail-fast.
    pub async fn pipeline(&self, request: &PipelineRequest) -> Result<PipelineResponse, EngineError> {
        let passes = match validate_passes(&request.passes) {
            Ok(passes) => passes,
            Err(err) => {
                warn!("pipeline request rejected: {err}");
                return Ok(failed_response(request.passes.clone(), err.to_string()));
            }
        };

        let scratch = Scratch::new()?;
        scratch.write_source(request.language, &request.source)?;

        let result = pipeline::run_pass_pipeline(
            &self.ctx,
            &scratch,
            request.language,
            request.optimization,
            &passes,
            request.opcode_detail,
        )
        .await;

        match result {
            Ok(outcome) => Ok(PipelineResponse {
                passes: request.passes.clone(),
                transformed_ir: outcome.transformed_ir,
                formatted_report: format_report(&outcome.report),
                report: Some(outcome.report),
                graph: Some(outcome.graph),
                error: None,
            }),
            Err(err) if err.is_infrastructure() => Err(err),
            Err(err) => {
                warn!("pipeline aborted: {err}");
                Ok(failed_response(request.passes.clone(), err.to_string()))
            }
        }
    }
}

fn failed_response(passes: Vec<String>, error: String) -> PipelineResponse {
    PipelineResponse {
        passes,
        transformed_ir: String::new(),
        report: None,
        formatted_report: String::new(),
        graph: None,
        error: Some(error),
    }
}
