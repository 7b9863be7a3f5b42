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

//! Request-scoped scratch directories
//!
//! Each request owns exactly one scratch directory for its whole
//! lifetime. It is mounted into every sandbox the request spawns and is
//! removed on drop, so cleanup holds on every exit path.

use crate::error::EngineError;
use optforge_common::models::Language;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixed stdin file name inside the scratch directory
pub const STDIN_FILE: &str = "input.txt";

/// Single-use scratch directory shared by one request's invocations
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Result<Self, EngineError> {
        let dir = TempDir::with_prefix("optforge-")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the untrusted source under its fixed per-language name
    pub fn write_source(&self, language: Language, source: &str) -> Result<&'static str, EngineError> {
        let name = language.source_name();
        fs::write(self.dir.path().join(name), source)?;
        Ok(name)
    }

    /// Write the program's stdin file; always present so run commands
    /// can redirect from it unconditionally
    pub fn write_stdin(&self, text: &str) -> Result<(), EngineError> {
        fs::write(self.dir.path().join(STDIN_FILE), text)?;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dir.path().join(name).is_file()
    }

    /// Read a text artifact a tool was expected to leave behind
    pub fn read_artifact(&self, name: &str) -> Result<String, EngineError> {
        let path = self.dir.path().join(name);
        if !path.is_file() {
            return Err(EngineError::ArtifactMissing { path: name.to_string() });
        }
        Ok(fs::read_to_string(path)?)
    }

    pub fn read_binary(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.dir.path().join(name);
        if !path.is_file() {
            return Err(EngineError::ArtifactMissing { path: name.to_string() });
        }
        Ok(fs::read(path)?)
    }

    /// Directory listing for diagnostics when an artifact never appeared
    pub fn listing(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// All graph-description files, hidden-name variants included,
    /// sorted for deterministic concatenation order
    pub fn dot_files(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = fs::read_dir(self.dir.path())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().map(|ext| ext == "dot").unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }
}
