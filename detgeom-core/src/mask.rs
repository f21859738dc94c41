//! Mask codes and the policy that collapses them into a usable/unusable view.
//!
//! Detector files carry a three-valued code per pixel. Assembly only needs a
//! boolean gate, and which codes pass the gate depends on the analysis: bad
//! pixels may still be worth keeping for some purposes, while pixels flagged
//! irrelevant never are.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-pixel mask code as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum MaskCode {
    /// Code 0.
    #[default]
    Good = 0,
    /// Code 1.
    Bad = 1,
    /// Code 2: not bad, but excluded from assembled images.
    Irrelevant = 2,
}

impl MaskCode {
    /// Returns the on-disk integer code.
    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this code counts as usable.
    ///
    /// `Good` is always usable and `Irrelevant` never is; `Bad` is usable only
    /// when `keep_bad` is set.
    #[inline]
    #[must_use]
    pub fn is_usable(self, keep_bad: bool) -> bool {
        match self {
            Self::Good => true,
            Self::Bad => keep_bad,
            Self::Irrelevant => false,
        }
    }
}

impl TryFrom<u8> for MaskCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Good),
            1 => Ok(Self::Bad),
            2 => Ok(Self::Irrelevant),
            other => Err(Error::InvalidMaskCode(other)),
        }
    }
}

impl From<MaskCode> for u8 {
    fn from(code: MaskCode) -> Self {
        code.as_u8()
    }
}

/// Policy for deriving the boolean usable mask from raw mask codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskPolicy {
    /// Apply the raw mask at all. When false every pixel is usable and the raw
    /// codes are reset to `Good`.
    pub enabled: bool,
    /// Treat `Bad` pixels as usable.
    pub keep_bad: bool,
}

impl Default for MaskPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_bad: false,
        }
    }
}

impl MaskPolicy {
    /// Creates a policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the raw mask is applied.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets whether `Bad` pixels count as usable.
    #[must_use]
    pub fn with_keep_bad(mut self, keep_bad: bool) -> Self {
        self.keep_bad = keep_bad;
        self
    }

    /// Resolves the usable mask.
    ///
    /// A disabled policy discards the loaded codes: `raw` is overwritten with
    /// `Good` so later writes and remasks start from a clean slate.
    pub fn resolve(&self, raw: &mut [MaskCode]) -> Vec<bool> {
        if !self.enabled {
            raw.fill(MaskCode::Good);
        }
        self.usable(raw)
    }

    /// Usable mask for `raw` without touching the codes.
    #[must_use]
    pub fn usable(&self, raw: &[MaskCode]) -> Vec<bool> {
        if !self.enabled {
            return vec![true; raw.len()];
        }
        raw.iter().map(|code| code.is_usable(self.keep_bad)).collect()
    }
}
