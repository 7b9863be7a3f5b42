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

//! Control-flow-graph extraction
//!
//! The external graph generator names its output after the function it
//! graphed, with a hidden-file variant depending on tool version. That
//! nondeterminism is tolerated in exactly one place: the discovery chain
//! below, which is strictly ordered. Canonical entry-named artifact
//! first, then a concatenation of every graph file in the scratch
//! directory, then an explicit not-found diagnostic.

use crate::context::AnalysisContext;
use crate::metrics::is_compile_error;
use crate::sandbox::SandboxError;
use crate::toolchain;
use crate::workspace::Scratch;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use optforge_common::models::{GraphArtifact, Language, OptLevel, ToolchainKind};
use std::fs;
use tracing::debug;

/// Entry function whose graph is considered canonical
pub const ENTRY_FUNCTION: &str = "main";

const RENDER_DOT_FILE: &str = "graph.dot";
const RENDER_PNG_FILE: &str = "graph.png";

/// Derive the CFG artifact for the request's entry function.
///
/// Defined only for the LLVM toolchain; anything else gets an explicit
/// unsupported result rather than an error.
pub async fn extract_cfg(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    toolchain_kind: ToolchainKind,
    language: Language,
    level: OptLevel,
) -> Result<GraphArtifact, SandboxError> {
    if toolchain_kind != ToolchainKind::Llvm {
        return Ok(GraphArtifact::Unsupported {
            reason: "CFG extraction requires the LLVM toolchain".to_string(),
        });
    }

    let compile_output = ctx
        .dispatch(
            toolchain::emit_ir_to(toolchain_kind, language, level, toolchain::CFG_IR_FILE),
            scratch.path(),
        )
        .await?;
    // A failed IR compile leaves nothing for the generator to graph, so
    // the generator invocation is not spent.
    if is_compile_error(&compile_output) {
        return Ok(GraphArtifact::NotFound {
            diagnostic: compile_output,
        });
    }

    let generator_output = ctx
        .dispatch(toolchain::generate_cfg(toolchain::CFG_IR_FILE), scratch.path())
        .await?;

    let raw_output = format!("{compile_output}{generator_output}");
    let artifact = discover_graph(scratch, ENTRY_FUNCTION, &raw_output);
    Ok(maybe_render(ctx, scratch, artifact).await)
}

/// Resolve the generator's artifact through the ordered fallback chain.
pub fn discover_graph(scratch: &Scratch, entry_function: &str, raw_output: &str) -> GraphArtifact {
    for candidate in [format!("{entry_function}.dot"), format!(".{entry_function}.dot")] {
        if let Ok(dot) = scratch.read_artifact(&candidate) {
            return GraphArtifact::Canonical { dot, image_base64: None };
        }
    }

    let dot_files = scratch.dot_files();
    if !dot_files.is_empty() {
        let mut combined = String::new();
        for path in &dot_files {
            if let Ok(text) = fs::read_to_string(path) {
                combined.push_str(&text);
                combined.push('\n');
            }
        }
        if !combined.trim().is_empty() {
            debug!(files = dot_files.len(), "canonical graph absent, concatenated fallback");
            return GraphArtifact::FallbackConcatenated {
                dot: combined,
                image_base64: None,
            };
        }
    }

    GraphArtifact::NotFound {
        diagnostic: format!(
            "no graph artifact was produced\ntool output:\n{raw_output}\nscratch contents: {:?}",
            scratch.listing()
        ),
    }
}

/// Attempt to render the graph text to PNG. Renderer trouble of any
/// kind silently degrades to the text artifact.
pub async fn maybe_render(ctx: &AnalysisContext, scratch: &Scratch, artifact: GraphArtifact) -> GraphArtifact {
    if !ctx.config().render_graphs {
        return artifact;
    }
    let Some(dot) = artifact.dot_text().map(str::to_owned) else {
        return artifact;
    };

    let image = render_png(ctx, scratch, &dot).await;
    if image.is_none() {
        debug!("graph render failed, returning text artifact");
    }

    match artifact {
        GraphArtifact::Canonical { dot, .. } => GraphArtifact::Canonical { dot, image_base64: image },
        GraphArtifact::FallbackConcatenated { dot, .. } => GraphArtifact::FallbackConcatenated { dot, image_base64: image },
        other => other,
    }
}

async fn render_png(ctx: &AnalysisContext, scratch: &Scratch, dot: &str) -> Option<String> {
    fs::write(scratch.path().join(RENDER_DOT_FILE), dot).ok()?;
    ctx.dispatch(toolchain::render_dot(RENDER_DOT_FILE, RENDER_PNG_FILE), scratch.path())
        .await
        .ok()?;
    let png = scratch.read_binary(RENDER_PNG_FILE).ok()?;
    Some(BASE64.encode(png))
}
