//! Per-pixel geometry storage.
//!
//! `GeometryStore` keeps one column per pixel attribute (`SoA` layout). Index
//! `i` refers to the same physical pixel in every column and the order is the
//! file order; nothing in this crate reorders pixels.

use crate::mask::MaskCode;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Post-load normalization toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoadOptions {
    /// Divide `corr` by its mean so the mean becomes 1.
    pub norm: bool,
    /// Project the pixels onto the flat detector plane and zero `qz`.
    pub twodim: bool,
}

impl LoadOptions {
    /// Creates options with both toggles off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets correction-factor normalization.
    #[must_use]
    pub fn with_norm(mut self, norm: bool) -> Self {
        self.norm = norm;
        self
    }

    /// Sets curvature removal.
    #[must_use]
    pub fn with_twodim(mut self, twodim: bool) -> Self {
        self.twodim = twodim;
        self
    }
}

/// Pixel geometry of one detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryStore {
    qvals: Vec<[f64; 3]>,
    corr: Vec<f64>,
    raw_mask: Vec<MaskCode>,
    detd: f64,
    ewald_rad: f64,
    background: Option<Vec<f64>>,
}

impl GeometryStore {
    /// Creates a store from fully populated pixel columns.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `corr` or `raw_mask` differ in length from `qvals`.
    pub fn new(
        qvals: Vec<[f64; 3]>,
        corr: Vec<f64>,
        raw_mask: Vec<MaskCode>,
        detd: f64,
        ewald_rad: f64,
    ) -> Result<Self> {
        let num_pix = qvals.len();
        Error::check_len("corr", num_pix, corr.len())?;
        Error::check_len("mask", num_pix, raw_mask.len())?;
        Ok(Self {
            qvals,
            corr,
            raw_mask,
            detd,
            ewald_rad,
            background: None,
        })
    }

    /// Attaches a background array.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `background` does not have one value per pixel.
    pub fn with_background(mut self, background: Vec<f64>) -> Result<Self> {
        self.set_background(Some(background))?;
        Ok(self)
    }

    /// Number of pixels.
    #[must_use]
    pub fn num_pix(&self) -> usize {
        self.qvals.len()
    }

    /// Returns true if the store holds no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.qvals.is_empty()
    }

    /// Reciprocal-space coordinates, one triple per pixel.
    #[must_use]
    pub fn qvals(&self) -> &[[f64; 3]] {
        &self.qvals
    }

    /// Correction factors (solid angle times polarization).
    #[must_use]
    pub fn corr(&self) -> &[f64] {
        &self.corr
    }

    /// Raw mask codes as loaded (or as later remasked).
    #[must_use]
    pub fn raw_mask(&self) -> &[MaskCode] {
        &self.raw_mask
    }

    pub(crate) fn raw_mask_mut(&mut self) -> &mut [MaskCode] {
        &mut self.raw_mask
    }

    /// Detector distance.
    #[must_use]
    pub fn detd(&self) -> f64 {
        self.detd
    }

    /// Ewald sphere radius.
    #[must_use]
    pub fn ewald_rad(&self) -> f64 {
        self.ewald_rad
    }

    /// Optional background array.
    #[must_use]
    pub fn background(&self) -> Option<&[f64]> {
        self.background.as_deref()
    }

    /// Replaces or clears the background array.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if the new array does not match `num_pix`.
    pub fn set_background(&mut self, background: Option<Vec<f64>>) -> Result<()> {
        if let Some(bg) = &background {
            Error::check_len("background", self.num_pix(), bg.len())?;
        }
        self.background = background;
        Ok(())
    }

    /// Replaces the reciprocal-space coordinates.
    ///
    /// Callers holding derived views (see [`crate::Detector`]) must rederive them.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if the pixel count would change.
    pub fn set_qvals(&mut self, qvals: Vec<[f64; 3]>) -> Result<()> {
        Error::check_len("qvals", self.num_pix(), qvals.len())?;
        self.qvals = qvals;
        Ok(())
    }

    /// Fails unless the pixel columns are populated.
    ///
    /// # Errors
    /// Returns a `State` error for an empty store.
    pub fn ensure_populated(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::State(
                "detector has no pixels; qvals, corr and mask must be populated".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the requested post-load normalization steps.
    pub fn apply(&mut self, options: LoadOptions) {
        if options.norm {
            self.normalize_corr();
        }
        if options.twodim {
            self.flatten_curvature();
        }
    }

    /// Scales `corr` so its mean is 1.
    pub fn normalize_corr(&mut self) {
        if self.corr.is_empty() {
            return;
        }
        let mean = self.corr.iter().sum::<f64>() / self.corr.len() as f64;
        if mean == 0.0 || !mean.is_finite() {
            log::warn!("cannot normalize correction factors: mean is {mean}");
            return;
        }
        for value in &mut self.corr {
            *value /= mean;
        }
    }

    /// Projects every pixel onto the flat detector plane.
    ///
    /// `qx` and `qy` are scaled by `detd / (qz + ewald_rad)` and `qz` is zeroed.
    pub fn flatten_curvature(&mut self) {
        for q in &mut self.qvals {
            let scale = self.detd / (q[2] + self.ewald_rad);
            q[0] *= scale;
            q[1] *= scale;
            q[2] = 0.0;
        }
    }

    /// Euclidean norm of each pixel's scattering vector.
    #[must_use]
    pub fn q_radius(&self) -> Vec<f64> {
        self.qvals
            .iter()
            .map(|q| (q[0] * q[0] + q[1] * q[1] + q[2] * q[2]).sqrt())
            .collect()
    }

    /// Decomposes the store into its columns.
    #[must_use]
    pub fn into_parts(self) -> StoreParts {
        StoreParts {
            qvals: self.qvals,
            corr: self.corr,
            raw_mask: self.raw_mask,
            detd: self.detd,
            ewald_rad: self.ewald_rad,
            background: self.background,
        }
    }
}

/// Owned columns of a [`GeometryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreParts {
    pub qvals: Vec<[f64; 3]>,
    pub corr: Vec<f64>,
    pub raw_mask: Vec<MaskCode>,
    pub detd: f64,
    pub ewald_rad: f64,
    pub background: Option<Vec<f64>>,
}
