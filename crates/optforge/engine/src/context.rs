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

//! Shared dispatch context for the analysis phases

use crate::sandbox::{Invocation, Sandbox, SandboxError, SANDBOX_IO_DIR};
use optforge_common::EngineConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Sandbox handle, configuration and the bounded dispatch pool shared by
/// every analysis phase of one engine instance.
///
/// The sandbox is injected rather than global so tests can substitute a
/// scripted double.
pub struct AnalysisContext {
    sandbox: Arc<dyn Sandbox>,
    config: Arc<EngineConfig>,
    permits: Arc<Semaphore>,
}

impl AnalysisContext {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: EngineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_sandboxes));
        Self {
            sandbox,
            config: Arc::new(config),
            permits,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one command with the scratch directory mounted, gated by the
    /// sandbox pool. Blocks until the container has exited.
    pub async fn dispatch(&self, command: Vec<String>, scratch_dir: &Path) -> Result<String, SandboxError> {
        self.dispatch_in(command, scratch_dir, SANDBOX_IO_DIR).await
    }

    /// As [`dispatch`](Self::dispatch), with an explicit working directory
    pub async fn dispatch_in(&self, command: Vec<String>, scratch_dir: &Path, workdir: &str) -> Result<String, SandboxError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SandboxError::Launch("sandbox pool closed".to_string()))?;

        let mut invocation = Invocation::new(self.config.image.clone(), command, scratch_dir);
        invocation.workdir = workdir.to_string();
        self.sandbox.execute(invocation).await
    }
}
