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

//! Command builders for the external toolchains
//!
//! Every builder produces a structured argument vector. The only tokens
//! interpolated into shell one-liners are drawn from closed enums, fixed
//! artifact names or engine configuration; user-controlled text never
//! reaches a command line. Artifact names are namespaced per phase, per
//! sweep level and per toolchain so concurrent invocations sharing one
//! scratch directory cannot clobber each other.

use crate::passes::PassId;
use optforge_common::models::{Language, OptLevel, ToolchainKind};

/// Compiled-and-linked program name used by run commands
pub const PROG_FILE: &str = "prog";

/// IR artifact consumed by the CFG extraction phase
pub const CFG_IR_FILE: &str = "cfg.ll";

/// Numbered IR artifact for one pipeline step
pub fn pipeline_ir_file(step: usize) -> String {
    format!("pipe_{step}.ll")
}

/// Per-level object name used by the optimization sweep
pub fn sweep_object_file(level: OptLevel) -> String {
    format!("sweep_{}.o", level.tag())
}

/// Per-toolchain object name used by the comparison engine
pub fn comparison_object_file(toolchain: ToolchainKind) -> String {
    format!("cmp_{}.o", toolchain.tag())
}

fn shell(line: String) -> Vec<String> {
    vec!["bash".to_string(), "-c".to_string(), line]
}

/// Emit textual assembly to stdout
pub fn emit_asm(toolchain: ToolchainKind, language: Language, level: OptLevel) -> Vec<String> {
    vec![
        toolchain.compiler(language).to_string(),
        "-S".to_string(),
        level.flag().to_string(),
        format!("/io/{}", language.source_name()),
        "-o".to_string(),
        "-".to_string(),
    ]
}

/// Emit textual IR to stdout. The GNU driver has no comparable textual
/// IR mode, so it degrades to assembly emission.
pub fn emit_ir(toolchain: ToolchainKind, language: Language, level: OptLevel) -> Vec<String> {
    match toolchain {
        ToolchainKind::Gnu => emit_asm(toolchain, language, level),
        ToolchainKind::Llvm => vec![
            toolchain.compiler(language).to_string(),
            "-S".to_string(),
            "-emit-llvm".to_string(),
            level.flag().to_string(),
            format!("/io/{}", language.source_name()),
            "-o".to_string(),
            "-".to_string(),
        ],
    }
}

/// Emit IR into a named scratch artifact
pub fn emit_ir_to(toolchain: ToolchainKind, language: Language, level: OptLevel, out: &str) -> Vec<String> {
    vec![
        toolchain.compiler(language).to_string(),
        "-S".to_string(),
        "-emit-llvm".to_string(),
        level.flag().to_string(),
        format!("/io/{}", language.source_name()),
        "-o".to_string(),
        format!("/io/{out}"),
    ]
}

/// Emit baseline IR for the pass pipeline with `optnone` annotations
/// disabled, so subsequent passes are not treated as no-ops
pub fn emit_baseline_ir(language: Language, level: OptLevel, out: &str) -> Vec<String> {
    vec![
        ToolchainKind::Llvm.compiler(language).to_string(),
        "-S".to_string(),
        "-emit-llvm".to_string(),
        level.flag().to_string(),
        "-Xclang".to_string(),
        "-disable-O0-optnone".to_string(),
        format!("/io/{}", language.source_name()),
        "-o".to_string(),
        format!("/io/{out}"),
    ]
}

/// Count lines of emitted assembly: the speed proxy
pub fn measure_asm_lines(toolchain: ToolchainKind, language: Language, level: OptLevel) -> Vec<String> {
    shell(format!(
        "{} -S {} /io/{} -o - | wc -l",
        toolchain.compiler(language),
        level.flag(),
        language.source_name()
    ))
}

/// Compile a relocatable object and print its byte size: the size proxy
pub fn measure_object_size(toolchain: ToolchainKind, language: Language, level: OptLevel, object: &str) -> Vec<String> {
    shell(format!(
        "{} -c {} /io/{} -o /io/{object} && stat -c %s /io/{object}",
        toolchain.compiler(language),
        level.flag(),
        language.source_name()
    ))
}

/// Build an executable and run it against the piped stdin file under a
/// wall-clock bound. Only the program's execution is time-limited;
/// compilation is not.
pub fn build_and_run(toolchain: ToolchainKind, language: Language, level: OptLevel, timeout_secs: u64) -> Vec<String> {
    shell(format!(
        "{} {} /io/{} -o /io/{PROG_FILE} && timeout {timeout_secs}s /io/{PROG_FILE} < /io/{}",
        toolchain.compiler(language),
        level.flag(),
        language.source_name(),
        crate::workspace::STDIN_FILE
    ))
}

/// Apply exactly one IR transformation pass
pub fn apply_pass(pass: PassId, input: &str, output: &str) -> Vec<String> {
    vec![
        "opt".to_string(),
        "-S".to_string(),
        format!("-passes={}", pass.as_str()),
        format!("/io/{input}"),
        "-o".to_string(),
        format!("/io/{output}"),
    ]
}

/// Run the opcode-counter analysis plugin over an IR artifact
pub fn count_opcodes(plugin_path: &str, input: &str) -> Vec<String> {
    vec![
        "opt".to_string(),
        format!("-load-pass-plugin={plugin_path}"),
        "-passes=opcode-counter".to_string(),
        "-disable-output".to_string(),
        format!("/io/{input}"),
    ]
}

/// Generate per-function CFG dot files into the working directory
pub fn generate_cfg(input: &str) -> Vec<String> {
    vec![
        "opt".to_string(),
        "-passes=dot-cfg".to_string(),
        "-disable-output".to_string(),
        input.to_string(),
    ]
}

/// Render a dot file to PNG
pub fn render_dot(input: &str, output: &str) -> Vec<String> {
    vec![
        "dot".to_string(),
        "-Tpng".to_string(),
        format!("/io/{input}"),
        "-o".to_string(),
        format!("/io/{output}"),
    ]
}
