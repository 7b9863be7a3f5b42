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

//! End-to-end orchestrator scenarios driven by a scripted sandbox
//!
//! The scripted double stands in for the Docker executor: it inspects
//! each invocation's argument vector, fabricates realistic tool output
//! and leaves artifacts in the mounted scratch directory, so the whole
//! engine runs without a container daemon.

use async_trait::async_trait;
use optforge_common::models::{
    CompileRequest, GraphArtifact, Language, MetricWinner, OptLevel, OutputKind, PhaseResult, PipelineRequest, ToolchainKind,
};
use optforge_common::{EngineConfig, METRIC_SENTINEL};
use optforge_engine::{Invocation, Orchestrator, Sandbox, SandboxError};
use std::fs;
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(&Invocation) -> Result<String, SandboxError> + Send + Sync;

struct ScriptedSandbox {
    calls: Mutex<Vec<Vec<String>>>,
    handler: Box<Handler>,
}

impl ScriptedSandbox {
    fn new(handler: impl Fn(&Invocation) -> Result<String, SandboxError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(&self, invocation: Invocation) -> Result<String, SandboxError> {
        self.calls.lock().unwrap().push(invocation.command.clone());
        (self.handler)(&invocation)
    }
}

fn orchestrator_with(sandbox: Arc<ScriptedSandbox>) -> Orchestrator {
    Orchestrator::new(sandbox, EngineConfig::default())
}

fn opt_flag_in(cmd: &str) -> &'static str {
    for flag in ["-O0", "-O1", "-O2", "-O3", "-Os"] {
        if cmd.contains(flag) {
            return flag;
        }
    }
    "-O?"
}

fn counter_text(function: &str, rows: &[(&str, u64)]) -> String {
    let mut out = String::from("---------------------------------------------\n");
    out.push_str(&format!("Opcode Counts for Function: {function}\n"));
    for (name, count) in rows {
        out.push_str(&format!("{name} : {count}\n"));
    }
    out.push_str("---------------------------------------------\n");
    out
}

/// Path after `-o`, relative to the scratch mount, if any
fn output_artifact(invocation: &Invocation) -> Option<String> {
    let index = invocation.command.iter().position(|arg| arg == "-o")?;
    let path = invocation.command.get(index + 1)?;
    path.strip_prefix("/io/").map(str::to_owned)
}

/// A well-behaved toolchain: every command succeeds with plausible output
fn healthy_toolchain(invocation: &Invocation) -> Result<String, SandboxError> {
    let cmd = invocation.command.join(" ");

    if cmd.contains("| wc -l") {
        let lines = match opt_flag_in(&cmd) {
            "-O0" => 150,
            "-O1" => 120,
            "-O2" => 100,
            "-O3" => 100,
            _ => 110,
        };
        return Ok(format!("{lines}\n"));
    }

    if cmd.contains("stat -c %s") {
        let bytes = match opt_flag_in(&cmd) {
            "-O0" => 4096,
            "-O1" => 3500,
            "-O2" => 3200,
            "-O3" => 3400,
            _ => 3000,
        };
        return Ok(format!("{bytes}\n"));
    }

    if cmd.contains("timeout") {
        return Ok("hello from prog\n".to_string());
    }

    if cmd.contains("-passes=dot-cfg") {
        fs::write(invocation.scratch_dir.join(".main.dot"), "digraph \"CFG for 'main'\" {}").unwrap();
        return Ok(String::new());
    }

    if cmd.contains("-passes=opcode-counter") {
        let input = invocation.command.last().unwrap();
        let rows: &[(&str, u64)] = if input.ends_with("pipe_0.ll") {
            &[("alloca", 6), ("store", 12), ("load", 8), ("br", 3), ("ret", 1)] // 30
        } else if input.ends_with("pipe_1.ll") {
            &[("store", 10), ("load", 9), ("br", 4), ("ret", 1)] // 24
        } else {
            &[("load", 16), ("br", 4), ("ret", 1)] // 21
        };
        return Ok(counter_text("main", rows));
    }

    if cmd.contains("-passes=") {
        // Single-pass opt invocation writes the next IR artifact
        if let Some(artifact) = output_artifact(invocation) {
            fs::write(invocation.scratch_dir.join(&artifact), format!("; transformed {artifact}\ndefine i32 @main() {{\n  ret i32 0\n}}\n")).unwrap();
        }
        return Ok(String::new());
    }

    if cmd.contains("-emit-llvm") {
        match output_artifact(invocation) {
            Some(artifact) => {
                fs::write(invocation.scratch_dir.join(&artifact), format!("; baseline {artifact}\ndefine i32 @main() {{\n  ret i32 0\n}}\n")).unwrap();
                return Ok(String::new());
            }
            None => return Ok("define i32 @main() {\n  ret i32 0\n}\n".to_string()),
        }
    }

    if cmd.contains("-S") {
        return Ok(".text\nmain:\n  xorl %eax, %eax\n  ret\n".to_string());
    }

    Ok(String::new())
}

fn compile_request(output: OutputKind) -> CompileRequest {
    CompileRequest {
        source: "int main() { return 0; }\n".to_string(),
        language: Language::C,
        toolchain: ToolchainKind::Llvm,
        optimization: OptLevel::O0,
        output,
        stdin: None,
    }
}

// Scenario A: valid C program, LLVM toolchain, -O0, output=asm.
#[tokio::test]
async fn valid_program_returns_assembly_and_full_sweep() {
    let sandbox = ScriptedSandbox::new(healthy_toolchain);
    let orchestrator = orchestrator_with(sandbox.clone());

    let response = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap();

    assert!(response.output.contains(".text"));
    assert!(response.error.is_none());

    let sweep = response.sweep.completed().expect("sweep should complete");
    assert_eq!(sweep.samples.len(), 5);
    let labels: Vec<&str> = sweep.samples.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["-O0", "-O1", "-O2", "-O3", "-Os"]);
    // -O2 and -O3 tie on speed; the earlier level must win.
    assert_eq!(sweep.best_speed.as_deref(), Some("-O2"));
    assert_eq!(sweep.best_size.as_deref(), Some("-Os"));

    assert!(response.comparison.completed().is_some());
    match response.graph.completed() {
        Some(GraphArtifact::Canonical { dot, .. }) => assert!(dot.contains("CFG for 'main'")),
        other => panic!("expected canonical graph, got {other:?}"),
    }
}

// Scenario B: a syntax error short-circuits after one invocation.
#[tokio::test]
async fn compile_error_short_circuits_remaining_phases() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        assert_eq!(invocation.command[0], "clang");
        Ok("main.c:2:5: error: expected ';' after expression\n".to_string())
    });
    let orchestrator = orchestrator_with(sandbox.clone());

    let response = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap();

    assert!(response.output.is_empty());
    assert!(response.error.as_deref().unwrap().contains("error:"));
    assert!(response.sweep.is_skipped());
    assert!(response.comparison.is_skipped());
    assert!(response.graph.is_skipped());
    // The failing primary compile costs exactly one sandbox invocation.
    assert_eq!(sandbox.call_count(), 1);
}

// Scenario C: two-pass pipeline with exact delta accounting.
#[tokio::test]
async fn pipeline_tracks_per_step_deltas_exactly() {
    let sandbox = ScriptedSandbox::new(healthy_toolchain);
    let orchestrator = orchestrator_with(sandbox);

    let request = PipelineRequest {
        source: "int main() { int x = 1; return x; }\n".to_string(),
        language: Language::C,
        passes: vec!["mem2reg".to_string(), "dce".to_string()],
        optimization: OptLevel::O0,
        opcode_detail: true,
    };
    let response = orchestrator.pipeline(&request).await.unwrap();

    assert!(response.error.is_none());
    let report = response.report.expect("pipeline should produce a report");
    assert_eq!(report.baseline_count, 30);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].instruction_count, 24);
    assert_eq!(report.steps[0].delta, 6);
    assert_eq!(report.steps[1].instruction_count, 21);
    assert_eq!(report.steps[1].delta, 3);
    assert_eq!(report.final_count, 21);

    let delta_sum: i64 = report.steps.iter().map(|s| s.delta).sum();
    assert_eq!(report.baseline_count as i64 - report.final_count as i64, delta_sum);

    assert!(response.transformed_ir.contains("@main"));
    assert!(report.opcode_detail.unwrap().contains("load : 16"));
    assert!(matches!(response.graph, Some(GraphArtifact::Canonical { .. })));
    assert!(response.formatted_report.contains("mem2reg"));
}

// Scenario D: identical speed metric on both toolchains.
#[tokio::test]
async fn identical_speed_metrics_tie() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("| wc -l") {
            return Ok("100\n".to_string());
        }
        if cmd.contains("stat -c %s") {
            // gcc object smaller than clang's
            let bytes = if cmd.contains("cmp_gnu.o") { 3000 } else { 3600 };
            return Ok(format!("{bytes}\n"));
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let response = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap();
    let comparison = response.comparison.completed().unwrap();
    assert_eq!(comparison.speed_winner, MetricWinner::Tie);
    assert_eq!(comparison.size_winner, MetricWinner::Gnu);
}

// One sweep level failing records sentinels without aborting the sweep.
#[tokio::test]
async fn sweep_degrades_single_failed_level() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("-O3") && (cmd.contains("| wc -l") || cmd.contains("stat -c %s")) {
            // Internal compiler failure: output with no trailing number
            return Ok("clang: internal failure at -O3\n".to_string());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let response = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap();
    let sweep = response.sweep.completed().unwrap();

    assert_eq!(sweep.samples.len(), 5);
    assert_eq!(sweep.samples[3].label, "-O3");
    assert_eq!(sweep.samples[3].speed_metric, METRIC_SENTINEL);
    assert_eq!(sweep.samples[3].size_metric, METRIC_SENTINEL);
    assert!(sweep.samples[2].speed_metric != METRIC_SENTINEL);
    assert_ne!(sweep.best_speed.as_deref(), Some("-O3"));
}

// A sweep level whose compiler fails still ends its piped measurement in
// a trailing 0 from the line counter; the diagnostic must override it.
#[tokio::test]
async fn sweep_level_with_piped_zero_diagnostic_records_sentinels() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("-O3") && cmd.contains("| wc -l") {
            return Ok("main.c:5:9: error: use of undeclared identifier 'y'\n0\n".to_string());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let response = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap();
    let sweep = response.sweep.completed().unwrap();

    assert_eq!(sweep.samples[3].label, "-O3");
    assert_eq!(sweep.samples[3].speed_metric, METRIC_SENTINEL);
    assert_eq!(sweep.samples[3].size_metric, METRIC_SENTINEL);
    assert_ne!(sweep.best_speed.as_deref(), Some("-O3"));
    assert_ne!(sweep.best_size.as_deref(), Some("-O3"));
}

// One toolchain failing to compile records sentinels end-to-end and the
// measured toolchain wins both metrics.
#[tokio::test]
async fn failing_toolchain_loses_comparison_outright() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("gcc") && cmd.contains("| wc -l") {
            return Ok("main.c:3:1: error: unknown type name 'auto'\n0\n".to_string());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let response = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap();
    let comparison = response.comparison.completed().unwrap();

    assert_eq!(comparison.gnu.speed_metric, METRIC_SENTINEL);
    assert_eq!(comparison.gnu.size_metric, METRIC_SENTINEL);
    assert!(comparison.llvm.speed_metric < METRIC_SENTINEL);
    assert_eq!(comparison.speed_winner, MetricWinner::Llvm);
    assert_eq!(comparison.size_winner, MetricWinner::Llvm);
}

// Unknown pass identifiers are rejected before any sandbox invocation.
#[tokio::test]
async fn unknown_pass_rejected_without_sandbox_use() {
    let sandbox = ScriptedSandbox::new(healthy_toolchain);
    let orchestrator = orchestrator_with(sandbox.clone());

    let request = PipelineRequest {
        source: "int main() { return 0; }\n".to_string(),
        language: Language::C,
        passes: vec!["mem2reg".to_string(), "format-disk".to_string()],
        optimization: OptLevel::O0,
        opcode_detail: false,
    };
    let response = orchestrator.pipeline(&request).await.unwrap();

    assert!(response.error.as_deref().unwrap().contains("unknown pass"));
    assert!(response.report.is_none());
    assert_eq!(sandbox.call_count(), 0);
}

// Zero passes: baseline IR unchanged, empty step report.
#[tokio::test]
async fn empty_pipeline_returns_baseline_unchanged() {
    let sandbox = ScriptedSandbox::new(healthy_toolchain);
    let orchestrator = orchestrator_with(sandbox);

    let request = PipelineRequest {
        source: "int main() { return 0; }\n".to_string(),
        language: Language::C,
        passes: vec![],
        optimization: OptLevel::O0,
        opcode_detail: false,
    };
    let response = orchestrator.pipeline(&request).await.unwrap();

    let report = response.report.unwrap();
    assert!(report.steps.is_empty());
    assert_eq!(report.baseline_count, report.final_count);
    assert_eq!(report.reduction, 0);
    assert!(response.transformed_ir.contains("baseline pipe_0.ll"));
}

// A failing middle step aborts the pipeline and discards partial results.
#[tokio::test]
async fn pipeline_step_failure_discards_partial_results() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("-passes=dce") {
            return Ok("opt: error: unable to schedule pass\n".to_string());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let request = PipelineRequest {
        source: "int main() { return 0; }\n".to_string(),
        language: Language::C,
        passes: vec!["mem2reg".to_string(), "dce".to_string()],
        optimization: OptLevel::O0,
        opcode_detail: false,
    };
    let response = orchestrator.pipeline(&request).await.unwrap();

    let error = response.error.expect("pipeline should abort");
    assert!(error.contains("dce"));
    assert!(response.report.is_none());
    assert!(response.transformed_ir.is_empty());
}

// A pass that claims success but writes no artifact also aborts.
#[tokio::test]
async fn missing_step_artifact_aborts_pipeline() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("-passes=dce") {
            // Exit quietly without producing the output file
            return Ok(String::new());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let request = PipelineRequest {
        source: "int main() { return 0; }\n".to_string(),
        language: Language::C,
        passes: vec!["dce".to_string()],
        optimization: OptLevel::O0,
        opcode_detail: false,
    };
    let response = orchestrator.pipeline(&request).await.unwrap();

    assert!(response.error.as_deref().unwrap().contains("pipe_1.ll"));
}

// Graph output falls back to concatenation when no canonical file exists.
#[tokio::test]
async fn graph_discovery_uses_fallback_chain() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("-passes=dot-cfg") {
            fs::write(invocation.scratch_dir.join(".helper.dot"), "digraph helper {}").unwrap();
            fs::write(invocation.scratch_dir.join("extra.dot"), "digraph extra {}").unwrap();
            return Ok(String::new());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox);

    let response = orchestrator.compile(&compile_request(OutputKind::Graph)).await.unwrap();
    match response.graph.completed() {
        Some(GraphArtifact::FallbackConcatenated { dot, .. }) => {
            assert!(dot.contains("digraph helper {}"));
            assert!(dot.contains("digraph extra {}"));
        }
        other => panic!("expected fallback artifact, got {other:?}"),
    }
    assert!(response.output.contains("digraph helper {}"));
}

// A graph request whose IR compile fails never spends the generator
// invocation.
#[tokio::test]
async fn graph_compile_failure_skips_generator() {
    let sandbox = ScriptedSandbox::new(|invocation: &Invocation| {
        let cmd = invocation.command.join(" ");
        if cmd.contains("-emit-llvm") {
            return Ok("main.c:1:1: error: expected identifier\n".to_string());
        }
        healthy_toolchain(invocation)
    });
    let orchestrator = orchestrator_with(sandbox.clone());

    let response = orchestrator.compile(&compile_request(OutputKind::Graph)).await.unwrap();

    assert!(response.error.as_deref().unwrap().contains("error:"));
    assert!(response.sweep.is_skipped());
    // Only the failing IR compile hits the sandbox.
    assert_eq!(sandbox.call_count(), 1);
}

// CFG extraction is unsupported, not an error, for the GNU toolchain.
#[tokio::test]
async fn gnu_toolchain_graph_is_unsupported() {
    let sandbox = ScriptedSandbox::new(healthy_toolchain);
    let orchestrator = orchestrator_with(sandbox);

    let mut request = compile_request(OutputKind::Graph);
    request.toolchain = ToolchainKind::Gnu;
    let response = orchestrator.compile(&request).await.unwrap();

    assert!(response.error.is_none());
    assert!(matches!(response.graph.completed(), Some(GraphArtifact::Unsupported { .. })));
}

// Infrastructure failures escape as request-level errors.
#[tokio::test]
async fn infrastructure_failure_is_request_fatal() {
    let sandbox = ScriptedSandbox::new(|_: &Invocation| Err(SandboxError::Daemon("connection refused".to_string())));
    let orchestrator = orchestrator_with(sandbox);

    let err = orchestrator.compile(&compile_request(OutputKind::Asm)).await.unwrap_err();
    assert!(err.is_infrastructure());

    let request = PipelineRequest {
        source: "int main() { return 0; }\n".to_string(),
        language: Language::C,
        passes: vec!["mem2reg".to_string()],
        optimization: OptLevel::O0,
        opcode_detail: false,
    };
    let sandbox = ScriptedSandbox::new(|_: &Invocation| Err(SandboxError::Daemon("connection refused".to_string())));
    let orchestrator = orchestrator_with(sandbox);
    let err = orchestrator.pipeline(&request).await.unwrap_err();
    assert!(err.is_infrastructure());
}

// Run output pipes stdin and bounds only the program's execution.
#[tokio::test]
async fn run_primary_pipes_stdin_under_timeout() {
    let sandbox = ScriptedSandbox::new(healthy_toolchain);
    let orchestrator = orchestrator_with(sandbox.clone());

    let mut request = compile_request(OutputKind::Run);
    request.stdin = Some("42\n".to_string());
    let response = orchestrator.compile(&request).await.unwrap();

    assert_eq!(response.output, "hello from prog\n");
    let first = sandbox.calls.lock().unwrap()[0].clone();
    let line = first.join(" ");
    assert!(line.contains("timeout 2s /io/prog < /io/input.txt"));
}
