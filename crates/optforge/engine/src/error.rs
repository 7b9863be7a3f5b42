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

//! Error types for the analysis engine

use crate::sandbox::SandboxError;
use thiserror::Error;

/// Errors raised by the analysis engine.
///
/// Only `Infrastructure` escapes an orchestrator call as a request-level
/// failure; everything else is converted into a structured response field
/// by the caller.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The sandbox subsystem itself could not run a command
    #[error("sandbox infrastructure failure: {0}")]
    Infrastructure(#[from] SandboxError),

    /// A pass identifier outside the allow-list was requested
    #[error("unknown pass identifier: {0}")]
    UnknownPass(String),

    /// One pipeline step produced diagnostic output
    #[error("pass `{pass}` failed: {detail}")]
    StepFailed { pass: String, detail: String },

    /// A tool reported success but its expected output file is absent
    #[error("expected artifact `{path}` was not produced")]
    ArtifactMissing { path: String },

    /// Scratch-directory I/O failed
    #[error("scratch i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for failures that must surface as a request-level error
    /// rather than inside a response envelope
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, EngineError::Infrastructure(_))
    }
}
