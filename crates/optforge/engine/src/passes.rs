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

//! Closed allow-list of IR transformation passes
//!
//! Pass identifiers arrive as untrusted strings and are mapped onto this
//! enum before anything touches a sandbox. Because only enum values ever
//! reach a command line, there is no injection surface to check at
//! runtime.

use crate::error::EngineError;
use std::fmt;
use std::str::FromStr;

/// A named IR transformation pass the pipeline may apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Mem2Reg,
    Dce,
    Adce,
    Sroa,
    Gvn,
    InstCombine,
    SimplifyCfg,
    Sccp,
    EarlyCse,
    Reassociate,
    Licm,
    LoopSimplify,
    Dse,
}

impl PassId {
    /// All permitted passes, for listings and help output
    pub const ALL: [PassId; 13] = [
        PassId::Mem2Reg,
        PassId::Dce,
        PassId::Adce,
        PassId::Sroa,
        PassId::Gvn,
        PassId::InstCombine,
        PassId::SimplifyCfg,
        PassId::Sccp,
        PassId::EarlyCse,
        PassId::Reassociate,
        PassId::Licm,
        PassId::LoopSimplify,
        PassId::Dse,
    ];

    /// The pass-runner's name for this pass
    pub fn as_str(self) -> &'static str {
        match self {
            PassId::Mem2Reg => "mem2reg",
            PassId::Dce => "dce",
            PassId::Adce => "adce",
            PassId::Sroa => "sroa",
            PassId::Gvn => "gvn",
            PassId::InstCombine => "instcombine",
            PassId::SimplifyCfg => "simplifycfg",
            PassId::Sccp => "sccp",
            PassId::EarlyCse => "early-cse",
            PassId::Reassociate => "reassociate",
            PassId::Licm => "licm",
            PassId::LoopSimplify => "loop-simplify",
            PassId::Dse => "dse",
        }
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PassId::ALL
            .iter()
            .copied()
            .find(|pass| pass.as_str() == s)
            .ok_or_else(|| EngineError::UnknownPass(s.to_string()))
    }
}

/// Validate an ordered list of pass names, preserving caller order.
///
/// Rejects the whole request on the first unknown identifier, before any
/// sandbox invocation is spent.
pub fn validate_passes(names: &[String]) -> Result<Vec<PassId>, EngineError> {
    names.iter().map(|name| name.parse()).collect()
}
