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

//! Isolated command execution
//!
//! A sandbox runs exactly one command in a resource-bounded environment
//! with the request's scratch directory mounted at `/io`. A non-zero exit
//! from the invoked tool is data, not an error: the combined output is
//! returned either way. Only an inability to start the isolated
//! environment is reported as [`SandboxError`].

mod docker;

pub use docker::DockerSandbox;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// In-sandbox mount point of the scratch directory
pub const SANDBOX_IO_DIR: &str = "/io";

/// One single-use sandbox invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Container image to run
    pub image: String,

    /// Structured argument vector; never a user-assembled shell string
    pub command: Vec<String>,

    /// Host scratch directory mounted read-write at [`SANDBOX_IO_DIR`]
    pub scratch_dir: PathBuf,

    /// Working directory inside the container
    pub workdir: String,
}

impl Invocation {
    pub fn new(image: impl Into<String>, command: Vec<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            command,
            scratch_dir: scratch_dir.into(),
            workdir: SANDBOX_IO_DIR.to_string(),
        }
    }
}

/// Failure of the sandbox subsystem itself.
///
/// Always fatal for the enclosing request, and reported distinctly from
/// user-code failures.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The container daemon is unreachable
    #[error("container daemon unavailable: {0}")]
    Daemon(String),

    /// A container could not be created, mounted or started
    #[error("failed to launch sandbox: {0}")]
    Launch(String),
}

/// Executes one command in an isolated, resource-bounded environment.
///
/// Injected into every engine component so tests can substitute a
/// scripted double for the Docker-backed implementation.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run the invocation to completion and return its combined
    /// stdout/stderr text
    async fn execute(&self, invocation: Invocation) -> Result<String, SandboxError>;
}
