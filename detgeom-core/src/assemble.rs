//! Scattering flat per-pixel values onto a 2D image grid.
//!
//! Several pixels can round onto the same grid cell (detector curvature,
//! tiling gaps). Contributions to a cell are summed, never overwritten, and
//! the sum is left as is: it models accumulated counts, not an average.

use crate::geometry::PixelCoords;
use crate::{Error, Result};
use ndarray::{s, Array2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Half-open bounding box `[x_min, x_max) x [y_min, y_max)` on the image grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoomBounds {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

impl ZoomBounds {
    /// Smallest box covering every point, or `None` for no points.
    #[must_use]
    pub fn covering<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bounds = Self {
            x_min: x0,
            x_max: x0 + 1,
            y_min: y0,
            y_max: y0 + 1,
        };
        for (x, y) in iter {
            bounds.x_min = bounds.x_min.min(x);
            bounds.x_max = bounds.x_max.max(x + 1);
            bounds.y_min = bounds.y_min.min(y);
            bounds.y_max = bounds.y_max.max(y + 1);
        }
        Some(bounds)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.x_max - self.x_min
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.y_max - self.y_min
    }
}

/// An assembled image together with its validity mask.
///
/// Cells no usable pixel maps onto are invalid. Their stored value is 0, but
/// callers should go through [`AssembledFrame::get`] or
/// [`AssembledFrame::filled`] rather than read `values` blindly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFrame {
    values: Array2<f64>,
    valid: Array2<bool>,
    origin: (usize, usize),
}

impl AssembledFrame {
    pub(crate) fn new(values: Array2<f64>, valid: Array2<bool>) -> Self {
        Self {
            values,
            valid,
            origin: (0, 0),
        }
    }

    /// Grid shape as `(nx, ny)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Raw accumulated values, indexed `[x, y]`.
    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Validity mask, indexed `[x, y]`.
    #[must_use]
    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Position of this frame's `[0, 0]` cell on the full grid.
    #[must_use]
    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    /// Value of a valid cell, `None` for invalid or out-of-range cells.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        match self.valid.get((x, y)) {
            Some(&true) => self.values.get((x, y)).copied(),
            _ => None,
        }
    }

    /// Copy of the values with invalid cells replaced by `fill`.
    #[must_use]
    pub fn filled(&self, fill: f64) -> Array2<f64> {
        let mut out = self.values.clone();
        out.zip_mut_with(&self.valid, |v, &ok| {
            if !ok {
                *v = fill;
            }
        });
        out
    }

    /// Number of valid cells.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&ok| ok).count()
    }

    pub(crate) fn crop(self, bounds: ZoomBounds) -> Self {
        let window = s![bounds.x_min..bounds.x_max, bounds.y_min..bounds.y_max];
        Self {
            values: self.values.slice(window).to_owned(),
            valid: self.valid.slice(window).to_owned(),
            origin: (self.origin.0 + bounds.x_min, self.origin.1 + bounds.y_min),
        }
    }
}

/// Zoom bounds over the grid cells of usable pixels.
///
/// # Errors
/// Returns `EmptyMask` if no pixel is usable.
pub fn zoom_bounds(coords: &PixelCoords, mask: &[bool]) -> Result<ZoomBounds> {
    ZoomBounds::covering(usable_cells(&coords.x, &coords.y, mask)).ok_or(Error::EmptyMask)
}

/// Assembles per-pixel `data` onto the detector grid.
///
/// The grid has shape `(max(x) + 1, max(y) + 1)` over all pixels. Pixels with
/// `mask[i] == false` contribute nothing. With `zoomed`, the frame is cropped
/// to [`zoom_bounds`].
///
/// # Errors
/// Returns `LengthMismatch` if `data` or `mask` do not match the pixel count,
/// or `EmptyMask` when zooming with no usable pixels.
pub fn assemble(
    coords: &PixelCoords,
    mask: &[bool],
    data: &[f64],
    zoomed: bool,
) -> Result<AssembledFrame> {
    let num_pix = coords.x.len();
    Error::check_len("data", num_pix, data.len())?;
    Error::check_len("mask", num_pix, mask.len())?;

    let shape = coords.grid_shape();
    let mut values = Array2::<f64>::zeros(shape);
    let mut counts = Array2::<u32>::zeros(shape);
    for i in (0..num_pix).filter(|&i| mask[i]) {
        let cell = (coords.x[i], coords.y[i]);
        values[cell] += data[i];
        counts[cell] += 1;
    }

    let frame = AssembledFrame::new(values, counts.mapv(|c| c > 0));
    if zoomed {
        Ok(frame.crop(zoom_bounds(coords, mask)?))
    } else {
        Ok(frame)
    }
}

fn usable_cells<'a>(
    x: &'a [usize],
    y: &'a [usize],
    mask: &'a [bool],
) -> impl Iterator<Item = (usize, usize)> + 'a {
    x.iter()
        .zip(y)
        .zip(mask)
        .filter(|&(_, &ok)| ok)
        .map(|((&x, &y), _)| (x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coords(x: Vec<usize>, y: Vec<usize>) -> PixelCoords {
        PixelCoords {
            cx: Vec::new(),
            cy: Vec::new(),
            x,
            y,
        }
    }

    #[test]
    fn test_collisions_accumulate() {
        let c = coords(vec![0, 1, 1, 3], vec![0, 2, 2, 1]);
        let frame = assemble(&c, &[true; 4], &[1.0, 2.0, 5.0, 7.0], false).unwrap();
        assert_eq!(frame.shape(), (4, 3));
        assert_relative_eq!(frame.get(1, 2).unwrap(), 7.0);
        assert_relative_eq!(frame.get(3, 1).unwrap(), 7.0);
        assert_eq!(frame.get(2, 2), None);
        assert_eq!(frame.valid_count(), 3);
    }

    #[test]
    fn test_masked_pixels_do_not_contribute() {
        let c = coords(vec![0, 0, 2], vec![0, 0, 0]);
        let frame = assemble(&c, &[true, false, false], &[1.0, 100.0, 3.0], false).unwrap();
        assert_relative_eq!(frame.get(0, 0).unwrap(), 1.0);
        // Unusable pixels still size the grid but leave their cell invalid.
        assert_eq!(frame.shape(), (3, 1));
        assert_eq!(frame.get(2, 0), None);
        assert!(frame.filled(f64::NAN)[[2, 0]].is_nan());
    }

    #[test]
    fn test_zoomed_crop() {
        let c = coords(vec![0, 2, 4, 3], vec![5, 1, 2, 3]);
        let mask = [false, true, true, true];
        let bounds = zoom_bounds(&c, &mask).unwrap();
        assert_eq!(
            bounds,
            ZoomBounds {
                x_min: 2,
                x_max: 5,
                y_min: 1,
                y_max: 4
            }
        );

        let frame = assemble(&c, &mask, &[9.0, 1.0, 2.0, 3.0], true).unwrap();
        assert_eq!(frame.shape(), (bounds.width(), bounds.height()));
        assert_eq!(frame.origin(), (2, 1));
        assert_relative_eq!(frame.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(frame.get(2, 1).unwrap(), 2.0);
        assert_relative_eq!(frame.get(1, 2).unwrap(), 3.0);
    }

    #[test]
    fn test_zoom_without_usable_pixels() {
        let c = coords(vec![0, 1], vec![0, 1]);
        assert_eq!(zoom_bounds(&c, &[false, false]), Err(Error::EmptyMask));
        assert!(assemble(&c, &[false, false], &[1.0, 1.0], false).is_ok());
        assert_eq!(
            assemble(&c, &[false, false], &[1.0, 1.0], true),
            Err(Error::EmptyMask)
        );
    }

    #[test]
    fn test_data_length_checked() {
        let c = coords(vec![0, 1], vec![0, 1]);
        assert!(matches!(
            assemble(&c, &[true, true], &[1.0], false),
            Err(Error::LengthMismatch { field: "data", .. })
        ));
    }
}
