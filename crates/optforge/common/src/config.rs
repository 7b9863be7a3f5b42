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

//! Engine configuration with environment overrides

use tracing::warn;

/// Tunables for the sandboxed analysis engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Toolchain container image
    pub image: String,

    /// Hard memory ceiling per sandbox, in bytes
    pub memory_limit_bytes: i64,

    /// CPU accounting period in microseconds
    pub cpu_period_us: i64,

    /// CPU quota per period in microseconds
    pub cpu_quota_us: i64,

    /// Wall-clock bound for the compiled program's execution, in seconds.
    /// Compilation itself is never time-bounded.
    pub run_timeout_secs: u64,

    /// Maximum sandbox invocations in flight at once
    pub max_concurrent_sandboxes: usize,

    /// uid:gid the sandboxed command runs as
    pub sandbox_user: String,

    /// In-image path of the opcode-counter pass plugin
    pub opcode_plugin_path: String,

    /// Attempt to render graph artifacts to PNG
    pub render_graphs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image: "optforge-toolchain:latest".to_string(),
            memory_limit_bytes: 256 * 1024 * 1024,
            cpu_period_us: 100_000,
            cpu_quota_us: 50_000,
            run_timeout_secs: 2,
            max_concurrent_sandboxes: 4,
            sandbox_user: "1000:1000".to_string(),
            opcode_plugin_path: "/usr/local/lib/libOpcodeCounter.so".to_string(),
            render_graphs: false,
        }
    }
}

impl EngineConfig {
    /// Build a config from defaults, overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(image) = std::env::var("OPTFORGE_IMAGE") {
            if !image.is_empty() {
                config.image = image;
            }
        }

        if let Ok(raw) = std::env::var("OPTFORGE_MEMORY_LIMIT_MB") {
            match raw.parse::<i64>() {
                Ok(mb) if mb > 0 => config.memory_limit_bytes = mb * 1024 * 1024,
                _ => warn!("invalid OPTFORGE_MEMORY_LIMIT_MB '{}', using default", raw),
            }
        }

        if let Ok(raw) = std::env::var("OPTFORGE_CPU_QUOTA_US") {
            match raw.parse::<i64>() {
                Ok(quota) if quota > 0 => config.cpu_quota_us = quota,
                _ => warn!("invalid OPTFORGE_CPU_QUOTA_US '{}', using default", raw),
            }
        }

        if let Ok(raw) = std::env::var("OPTFORGE_RUN_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.run_timeout_secs = secs,
                _ => warn!("invalid OPTFORGE_RUN_TIMEOUT_SECS '{}', using default", raw),
            }
        }

        if let Ok(raw) = std::env::var("OPTFORGE_SANDBOX_POOL") {
            match raw.parse::<usize>() {
                Ok(size) if size > 0 => config.max_concurrent_sandboxes = size,
                _ => warn!("invalid OPTFORGE_SANDBOX_POOL '{}', using default", raw),
            }
        }

        if let Ok(path) = std::env::var("OPTFORGE_OPCODE_PLUGIN") {
            if !path.is_empty() {
                config.opcode_plugin_path = path;
            }
        }

        if let Ok(raw) = std::env::var("OPTFORGE_RENDER_GRAPHS") {
            config.render_graphs = matches!(raw.as_str(), "1" | "true" | "yes");
        }

        config
    }
}
