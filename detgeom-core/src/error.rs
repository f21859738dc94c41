//! Error types for detgeom-core.

use thiserror::Error;

/// Result type alias for detgeom operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for detector geometry operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Inverse geometry requested before its inputs were set.
    #[error(
        "configuration error: missing {} (detd, cx and cy must share length units; \
         ewald_rad is in reciprocal-pixel units)",
        missing.join(", ")
    )]
    Configuration { missing: Vec<&'static str> },

    /// A pixel-indexed array does not have one entry per pixel.
    #[error("length mismatch for {field}: expected {expected} entries, found {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Raw mask value outside the {0, 1, 2} encoding.
    #[error("invalid mask code: {0} (expected 0, 1 or 2)")]
    InvalidMaskCode(u8),

    /// Operation requires state that has not been populated.
    #[error("state error: {0}")]
    State(String),

    /// A pixel projects to an infinite or NaN plane coordinate.
    #[error("pixel {pixel} has a non-finite plane coordinate (qz at -ewald_rad or non-finite qvals)")]
    NonFinite { pixel: usize },

    /// Zoom bounds requested while no pixel is usable.
    #[error("no usable pixels under the current mask policy")]
    EmptyMask,
}

impl Error {
    pub(crate) fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::LengthMismatch {
                field,
                expected,
                actual,
            })
        }
    }
}
