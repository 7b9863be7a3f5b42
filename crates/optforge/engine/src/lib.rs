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

//! Sandboxed multi-phase compiler analysis
//!
//! Optforge accepts untrusted C/C++ source, drives native toolchains
//! inside isolated containers and merges the results: the caller's
//! primary artifact, an optimization-level sweep, a head-to-head
//! toolchain comparison, a control-flow graph and an incremental pass
//! pipeline with per-step instruction deltas.

pub mod cfg;
pub mod comparison;
pub mod context;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod passes;
pub mod pipeline;
pub mod sandbox;
pub mod sweep;
pub mod toolchain;
pub mod workspace;

pub use context::AnalysisContext;
pub use error::EngineError;
pub use orchestrator::Orchestrator;
pub use sandbox::{DockerSandbox, Invocation, Sandbox, SandboxError};
