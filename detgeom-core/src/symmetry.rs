//! Centro-symmetric (folded) assembly.
//!
//! For samples with inversion symmetry the intensity at `q` equals the
//! intensity at `-q`, so every pixel also measures its point reflection
//! through the beam center. The folded grid is centered on the beam, each
//! usable pixel is written at its own cell and at the mirrored cell, and
//! cells measured from both sides are averaged.

use crate::assemble::{AssembledFrame, ZoomBounds};
use crate::geometry::{check_finite, PixelCoords};
use crate::{Error, Result};
use ndarray::Array2;

/// Cached geometry of the folded grid.
///
/// Depends on the plane coordinates and on the usable mask; rebuild it when
/// either changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryGrid {
    shape: (usize, usize),
    x: Vec<usize>,
    y: Vec<usize>,
    fx: Vec<usize>,
    fy: Vec<usize>,
    valid: Array2<bool>,
    bothgood: Array2<bool>,
    zoom: Option<ZoomBounds>,
}

impl SymmetryGrid {
    /// Builds the folded grid for the given coordinates and usable mask.
    ///
    /// The shape is `(2 * ceil(max|cx|) + 1, 2 * ceil(max|cy|) + 1)` so the
    /// beam center sits on the middle cell.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `mask` does not match the pixel count, or
    /// `NonFinite` for an infinite or NaN plane coordinate.
    pub fn build(coords: &PixelCoords, mask: &[bool]) -> Result<Self> {
        let num_pix = coords.cx.len();
        Error::check_len("cy", num_pix, coords.cy.len())?;
        Error::check_len("mask", num_pix, mask.len())?;
        check_finite(&coords.cx, &coords.cy)?;

        let nx = 2 * half_extent(&coords.cx) + 1;
        let ny = 2 * half_extent(&coords.cy) + 1;
        let x = center_round(&coords.cx, nx / 2);
        let y = center_round(&coords.cy, ny / 2);
        let fx: Vec<usize> = x.iter().map(|&v| nx - 1 - v).collect();
        let fy: Vec<usize> = y.iter().map(|&v| ny - 1 - v).collect();

        let mut coverage = Array2::<u32>::zeros((nx, ny));
        for i in (0..num_pix).filter(|&i| mask[i]) {
            coverage[(x[i], y[i])] += 1;
            coverage[(fx[i], fy[i])] += 1;
        }
        let valid = coverage.mapv(|c| c > 0);
        let bothgood = coverage.mapv(|c| c == 2);

        let forward = (0..num_pix).filter(|&i| mask[i]).map(|i| (x[i], y[i]));
        let mirrored = (0..num_pix).filter(|&i| mask[i]).map(|i| (fx[i], fy[i]));
        let zoom = ZoomBounds::covering(forward.chain(mirrored));

        log::debug!(
            "built folded grid {nx}x{ny}, {} cells covered from both sides",
            bothgood.iter().filter(|&&b| b).count()
        );

        Ok(Self {
            shape: (nx, ny),
            x,
            y,
            fx,
            fy,
            valid,
            bothgood,
            zoom,
        })
    }

    /// Folded grid shape as `(nx, ny)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Forward cell of each pixel.
    #[must_use]
    pub fn forward(&self) -> (&[usize], &[usize]) {
        (&self.x, &self.y)
    }

    /// Point-reflected cell of each pixel.
    #[must_use]
    pub fn mirrored(&self) -> (&[usize], &[usize]) {
        (&self.fx, &self.fy)
    }

    /// Cells covered from both the forward and the mirrored side.
    #[must_use]
    pub fn bothgood(&self) -> &Array2<bool> {
        &self.bothgood
    }

    /// Cells covered at least once.
    #[must_use]
    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Zoom bounds over forward and mirrored cells of usable pixels.
    ///
    /// # Errors
    /// Returns `EmptyMask` if no pixel is usable.
    pub fn zoom_bounds(&self) -> Result<ZoomBounds> {
        self.zoom.ok_or(Error::EmptyMask)
    }

    /// Assembles `data` onto the folded grid.
    ///
    /// Each usable pixel is added at its forward and its mirrored cell. Cells
    /// in [`SymmetryGrid::bothgood`] hold two measurements and are halved;
    /// every other cell keeps its raw sum.
    ///
    /// # Errors
    /// Returns `LengthMismatch` for wrongly sized inputs, or `EmptyMask` when
    /// zooming with no usable pixels.
    pub fn assemble(&self, mask: &[bool], data: &[f64], zoomed: bool) -> Result<AssembledFrame> {
        let num_pix = self.x.len();
        Error::check_len("data", num_pix, data.len())?;
        Error::check_len("mask", num_pix, mask.len())?;

        let mut values = Array2::<f64>::zeros(self.shape);
        for i in (0..num_pix).filter(|&i| mask[i]) {
            values[(self.x[i], self.y[i])] += data[i];
            values[(self.fx[i], self.fy[i])] += data[i];
        }
        values.zip_mut_with(&self.bothgood, |v, &both| {
            if both {
                *v /= 2.0;
            }
        });

        let frame = AssembledFrame::new(values, self.valid.clone());
        if zoomed {
            Ok(frame.crop(self.zoom_bounds()?))
        } else {
            Ok(frame)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn half_extent(values: &[f64]) -> usize {
    values.iter().fold(0.0_f64, |m, v| m.max(v.abs())).ceil() as usize
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn center_round(values: &[f64], center: usize) -> Vec<usize> {
    let offset = center as f64;
    values
        .iter()
        .map(|&v| (v + offset).round_ties_even() as usize)
        .collect()
}
