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

//! Request, response and report models for compiler analysis

use serde::{Deserialize, Serialize};

/// Sentinel metric value recorded when a measurement could not be taken.
///
/// Chosen so a failed configuration can never win a smaller-is-better
/// comparison.
pub const METRIC_SENTINEL: u64 = u64::MAX;

/// Source language of the submitted program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[serde(alias = "c++")]
    Cpp,
}

impl Language {
    /// Fixed in-sandbox source file name for this language
    pub fn source_name(self) -> &'static str {
        match self {
            Language::C => "main.c",
            Language::Cpp => "main.cpp",
        }
    }
}

/// Toolchain family used for compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    #[serde(alias = "gcc")]
    Gnu,
    #[serde(alias = "clang")]
    Llvm,
}

impl ToolchainKind {
    /// Compiler driver binary for the given language
    pub fn compiler(self, language: Language) -> &'static str {
        match (self, language) {
            (ToolchainKind::Gnu, Language::C) => "gcc",
            (ToolchainKind::Gnu, Language::Cpp) => "g++",
            (ToolchainKind::Llvm, Language::C) => "clang",
            (ToolchainKind::Llvm, Language::Cpp) => "clang++",
        }
    }

    /// Lowercase tag used to namespace per-toolchain artifacts
    pub fn tag(self) -> &'static str {
        match self {
            ToolchainKind::Gnu => "gnu",
            ToolchainKind::Llvm => "llvm",
        }
    }
}

/// Optimization level passed to the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptLevel {
    #[serde(rename = "-O0", alias = "O0")]
    O0,
    #[serde(rename = "-O1", alias = "O1")]
    O1,
    #[serde(rename = "-O2", alias = "O2")]
    O2,
    #[serde(rename = "-O3", alias = "O3")]
    O3,
    #[serde(rename = "-Os", alias = "Os")]
    Os,
}

impl OptLevel {
    /// The canonical sweep order
    pub const ALL: [OptLevel; 5] = [OptLevel::O0, OptLevel::O1, OptLevel::O2, OptLevel::O3, OptLevel::Os];

    /// Compiler command-line flag
    pub fn flag(self) -> &'static str {
        match self {
            OptLevel::O0 => "-O0",
            OptLevel::O1 => "-O1",
            OptLevel::O2 => "-O2",
            OptLevel::O3 => "-O3",
            OptLevel::Os => "-Os",
        }
    }

    /// Lowercase tag used to namespace per-level artifacts
    pub fn tag(self) -> &'static str {
        match self {
            OptLevel::O0 => "o0",
            OptLevel::O1 => "o1",
            OptLevel::O2 => "o2",
            OptLevel::O3 => "o3",
            OptLevel::Os => "os",
        }
    }
}

/// Primary artifact requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Compile, link and execute against the supplied stdin
    Run,
    /// Textual assembly
    Asm,
    /// Textual intermediate representation
    Ir,
    /// Control-flow graph description
    Graph,
}

/// One measurement pair for one compiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Configuration label (optimization flag or toolchain tag)
    pub label: String,

    /// Speed proxy: line count of the emitted assembly
    pub speed_metric: u64,

    /// Size proxy: byte size of the compiled object
    pub size_metric: u64,
}

impl MetricSample {
    /// Sample representing an unrecoverable measurement failure
    pub fn failed(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            speed_metric: METRIC_SENTINEL,
            size_metric: METRIC_SENTINEL,
        }
    }

    /// True if neither metric carries the failure sentinel
    pub fn is_measured(&self) -> bool {
        self.speed_metric != METRIC_SENTINEL || self.size_metric != METRIC_SENTINEL
    }
}

/// Result of sweeping all optimization levels with one toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// One sample per optimization level, in sweep order
    pub samples: Vec<MetricSample>,

    /// Label of the first-in-order level with the smallest speed metric
    pub best_speed: Option<String>,

    /// Label of the first-in-order level with the smallest size metric
    pub best_size: Option<String>,

    /// Human-readable summary
    pub recommendation: String,
}

/// Per-metric winner of a toolchain comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricWinner {
    Gnu,
    Llvm,
    Tie,
}

/// Head-to-head toolchain comparison at a single optimization level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// GNU toolchain sample
    pub gnu: MetricSample,

    /// LLVM toolchain sample
    pub llvm: MetricSample,

    /// Winner on the speed proxy
    pub speed_winner: MetricWinner,

    /// Winner on the size proxy
    pub size_winner: MetricWinner,

    /// Human-readable summary
    pub recommendation: String,
}

/// Control-flow-graph artifact, tagged with how it was obtained.
///
/// The graph generator's output file naming is not fully deterministic
/// across tool versions, so discovery is modelled explicitly instead of
/// being hidden behind string concatenation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provenance", rename_all = "snake_case")]
pub enum GraphArtifact {
    /// The entry-function-named artifact was found
    Canonical {
        dot: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image_base64: Option<String>,
    },
    /// No canonical artifact; all graph files in the scratch directory
    /// were concatenated instead
    FallbackConcatenated {
        dot: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image_base64: Option<String>,
    },
    /// The generator produced no graph files at all
    NotFound { diagnostic: String },
    /// The selected toolchain cannot produce a graph
    Unsupported { reason: String },
}

impl GraphArtifact {
    /// Graph-description text, if any was recovered
    pub fn dot_text(&self) -> Option<&str> {
        match self {
            GraphArtifact::Canonical { dot, .. } | GraphArtifact::FallbackConcatenated { dot, .. } => Some(dot),
            _ => None,
        }
    }
}

/// One step of the incremental pass pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStep {
    /// Pass identifier as applied
    pub pass: String,

    /// Instruction count after the pass ran
    pub instruction_count: u64,

    /// previous_count - instruction_count; negative when the pass grew the IR
    pub delta: i64,
}

/// Full report for one pass-pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Instruction count of the unoptimized baseline IR
    pub baseline_count: u64,

    /// Per-pass steps, in application order
    pub steps: Vec<PassStep>,

    /// Instruction count after the final pass
    pub final_count: u64,

    /// baseline_count - final_count; may be negative
    pub reduction: i64,

    /// Reduction as a percentage of the baseline
    pub reduction_percent: f64,

    /// Raw per-opcode breakdown of the final IR, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opcode_detail: Option<String>,
}

/// Outcome of one analysis phase in a merged response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum PhaseResult<T> {
    /// The phase ran and produced a report
    Completed(T),
    /// The phase was skipped because the primary compile failed
    Skipped,
}

impl<T> PhaseResult<T> {
    /// Borrow the completed report, if any
    pub fn completed(&self) -> Option<&T> {
        match self {
            PhaseResult::Completed(report) => Some(report),
            PhaseResult::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PhaseResult::Skipped)
    }
}

/// Inbound compile-and-analyze request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Untrusted C or C++ source text
    pub source: String,

    pub language: Language,

    pub toolchain: ToolchainKind,

    pub optimization: OptLevel,

    /// Which primary artifact to return
    pub output: OutputKind,

    /// Text piped to the program's stdin when output == run
    #[serde(default)]
    pub stdin: Option<String>,
}

/// Merged response for a compile-and-analyze request.
///
/// Tool-level failures (user code that does not compile, a tool that
/// misbehaves) ride inside this envelope; only sandbox infrastructure
/// failures are reported as a request-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResponse {
    /// The requested primary artifact; empty when `error` is set
    pub output: String,

    /// Compiler diagnostics when the primary compile failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub sweep: PhaseResult<SweepReport>,

    pub comparison: PhaseResult<ComparisonReport>,

    pub graph: PhaseResult<GraphArtifact>,
}

/// Inbound pass-pipeline request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Untrusted C or C++ source text
    pub source: String,

    pub language: Language,

    /// Ordered pass identifiers; validated against the allow-list before
    /// any sandbox invocation
    pub passes: Vec<String>,

    pub optimization: OptLevel,

    /// Append the full per-opcode breakdown of the final IR
    #[serde(default)]
    pub opcode_detail: bool,
}

/// Response for a pass-pipeline request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    /// Echo of the validated pass list
    pub passes: Vec<String>,

    /// Final transformed IR; empty when `error` is set
    pub transformed_ir: String,

    /// Structured step report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PipelineReport>,

    /// Aligned plain-text rendering of the step report
    pub formatted_report: String,

    /// CFG of the final transformed IR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphArtifact>,

    /// Failure detail when the pipeline aborted; partial results are
    /// discarded, not reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
