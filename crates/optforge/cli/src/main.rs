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

//! Optforge CLI
//!
//! Command-line front end for the sandboxed compiler analysis engine.
//! Responses are printed as JSON, matching the wire shapes of
//! `optforge-common`.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use optforge_common::models::{CompileRequest, Language, OptLevel, OutputKind, PipelineRequest, ToolchainKind};
use optforge_common::EngineConfig;
use optforge_engine::passes::PassId;
use optforge_engine::{DockerSandbox, Orchestrator};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "optforge")]
#[command(about = "Sandboxed C/C++ compiler analysis")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file and run the full analysis
    Compile(CompileArgs),
    /// Apply an ordered pass pipeline to a source file
    Pipeline(PipelineArgs),
    /// List the permitted transformation passes
    ListPasses,
}

#[derive(Args)]
struct CompileArgs {
    /// C or C++ source file
    input: PathBuf,

    /// Source language: c or cpp
    #[arg(long, default_value = "c")]
    language: String,

    /// Toolchain family: gnu or llvm
    #[arg(long, default_value = "llvm")]
    toolchain: String,

    /// Optimization level: -O0, -O1, -O2, -O3 or -Os
    #[arg(long, default_value = "-O0", allow_hyphen_values = true)]
    optimization: String,

    /// Primary artifact: run, asm, ir or graph
    #[arg(long, default_value = "asm")]
    output: String,

    /// File piped to the program's stdin when --output run
    #[arg(long)]
    stdin: Option<PathBuf>,
}

#[derive(Args)]
struct PipelineArgs {
    /// C or C++ source file
    input: PathBuf,

    /// Source language: c or cpp
    #[arg(long, default_value = "c")]
    language: String,

    /// Comma-separated ordered pass list, e.g. mem2reg,dce
    #[arg(long)]
    passes: String,

    /// Optimization level for the baseline IR
    #[arg(long, default_value = "-O0", allow_hyphen_values = true)]
    optimization: String,

    /// Append the per-opcode breakdown of the final IR
    #[arg(long)]
    opcode_detail: bool,
}

/// Parse a CLI token through the wire vocabulary of the request models
fn parse_token<T: DeserializeOwned>(token: &str, what: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(token.to_string())).map_err(|_| anyhow!("invalid {what}: {token}"))
}

fn build_orchestrator() -> Result<Orchestrator> {
    let config = EngineConfig::from_env();
    let sandbox = DockerSandbox::new(config.clone()).context("sandbox subsystem unavailable")?;
    Ok(Orchestrator::new(Arc::new(sandbox), config))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => {
            let source = std::fs::read_to_string(&args.input)
                .with_context(|| format!("failed to read {}", args.input.display()))?;
            let stdin = match &args.stdin {
                Some(path) => Some(std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?),
                None => None,
            };

            let request = CompileRequest {
                source,
                language: parse_token::<Language>(&args.language, "language")?,
                toolchain: parse_token::<ToolchainKind>(&args.toolchain, "toolchain")?,
                optimization: parse_token::<OptLevel>(&args.optimization, "optimization level")?,
                output: parse_token::<OutputKind>(&args.output, "output kind")?,
                stdin,
            };

            let orchestrator = build_orchestrator()?;
            let response = orchestrator.compile(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Pipeline(args) => {
            let source = std::fs::read_to_string(&args.input)
                .with_context(|| format!("failed to read {}", args.input.display()))?;

            let request = PipelineRequest {
                source,
                language: parse_token::<Language>(&args.language, "language")?,
                passes: args.passes.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect(),
                optimization: parse_token::<OptLevel>(&args.optimization, "optimization level")?,
                opcode_detail: args.opcode_detail,
            };

            let orchestrator = build_orchestrator()?;
            let response = orchestrator.pipeline(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::ListPasses => {
            for pass in PassId::ALL {
                println!("{pass}");
            }
        }
    }

    Ok(())
}
