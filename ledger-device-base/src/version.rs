//! App version negotiation.
//!
//! The apps speak one of two chunking protocols depending on their major
//! version. [`VersionRequirements`] maps each supported major version to the
//! oldest acceptable release and to the [`ChunkPolicy`] it speaks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{chunks::ChunkPolicy, LedgerAppError};

/// App mode byte reported by debug builds
pub const APP_MODE_DEBUG: u8 = 0xFF;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
/// App Version
pub struct VersionInfo {
    /// Application Mode, 0xFF for debug builds
    pub app_mode: u8,
    /// Version Major
    pub major: u8,
    /// Version Minor
    pub minor: u8,
    /// Version Patch
    pub patch: u8,
}

impl VersionInfo {
    pub const fn new(app_mode: u8, major: u8, minor: u8, patch: u8) -> Self {
        VersionInfo {
            app_mode,
            major,
            minor,
            patch,
        }
    }

    pub fn is_debug(&self) -> bool {
        self.app_mode == APP_MODE_DEBUG
    }

    /// Compares major, minor and patch; the app mode is ignored
    pub fn is_at_least(&self, required: &VersionInfo) -> bool {
        (self.major, self.minor, self.patch) >= (required.major, required.minor, required.patch)
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
/// Oldest supported release of one major version
pub struct VersionRequirement {
    pub minimum: VersionInfo,
    pub policy: ChunkPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
/// Supported major versions, at most one entry per major
pub struct VersionRequirements(Vec<VersionRequirement>);

impl Default for VersionRequirements {
    fn default() -> Self {
        VersionRequirements(vec![
            VersionRequirement {
                minimum: VersionInfo::new(0, 1, 5, 1),
                policy: ChunkPolicy::V1,
            },
            VersionRequirement {
                minimum: VersionInfo::new(0, 2, 0, 0),
                policy: ChunkPolicy::V2,
            },
        ])
    }
}

impl VersionRequirements {
    /// A table that accepts nothing until entries are added
    pub fn empty() -> Self {
        VersionRequirements(Vec::new())
    }

    /// Add or replace the entry for `minimum.major`
    pub fn with(mut self, minimum: VersionInfo, policy: ChunkPolicy) -> Self {
        self.0.retain(|r| r.minimum.major != minimum.major);
        self.0.push(VersionRequirement { minimum, policy });
        self
    }

    pub fn for_major(&self, major: u8) -> Option<&VersionRequirement> {
        self.0.iter().find(|r| r.minimum.major == major)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionRequirement> {
        self.0.iter()
    }
}

/// Check `reported` against the table and pick the chunking policy it speaks
pub fn check_version<E: std::error::Error>(
    reported: &VersionInfo,
    requirements: &VersionRequirements,
) -> Result<ChunkPolicy, LedgerAppError<E>> {
    let requirement = requirements
        .for_major(reported.major)
        .ok_or(LedgerAppError::UnsupportedVersion(reported.major))?;

    if !reported.is_at_least(&requirement.minimum) {
        return Err(LedgerAppError::VersionTooOld {
            found: *reported,
            required: requirement.minimum,
        });
    }

    Ok(requirement.policy)
}
