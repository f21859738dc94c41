//! Conversions between reciprocal-space pixel coordinates and the detector plane.

use crate::mask::MaskCode;
use crate::store::GeometryStore;
use crate::{Error, Result};

/// Planar and integer grid coordinates of every pixel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelCoords {
    /// Plane x coordinate, origin at the beam center.
    pub cx: Vec<f64>,
    /// Plane y coordinate, origin at the beam center.
    pub cy: Vec<f64>,
    /// Grid column: `cx` rounded and shifted so the minimum is 0.
    pub x: Vec<usize>,
    /// Grid row: `cy` rounded and shifted so the minimum is 0.
    pub y: Vec<usize>,
}

impl PixelCoords {
    /// Derives plane and grid coordinates for a store.
    ///
    /// # Errors
    /// Returns `NonFinite` for the first pixel whose plane coordinate is
    /// infinite or NaN, e.g. `qz == -ewald_rad` on the `+` branch.
    pub fn derive(store: &GeometryStore) -> Result<Self> {
        let (cx, cy) = project_to_2d(store);
        check_finite(&cx, &cy)?;
        let (x, y) = to_grid_coords(&cx, &cy);
        Ok(Self { cx, cy, x, y })
    }

    /// Size of a grid holding every pixel: `(max(x) + 1, max(y) + 1)`.
    #[must_use]
    pub fn grid_shape(&self) -> (usize, usize) {
        let nx = self.x.iter().max().map_or(0, |m| m.saturating_add(1));
        let ny = self.y.iter().max().map_or(0, |m| m.saturating_add(1));
        (nx, ny)
    }
}

pub(crate) fn check_finite(cx: &[f64], cy: &[f64]) -> Result<()> {
    match cx
        .iter()
        .zip(cy)
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        Some(pixel) => Err(Error::NonFinite { pixel }),
        None => Ok(()),
    }
}

/// Projects each pixel onto the detector plane.
///
/// The branch is chosen once for the whole detector from the mean `qz`: a
/// positive mean selects `detd / (ewald_rad - qz)`, anything else
/// `detd / (ewald_rad + qz)`. Pixels on the other side of the sphere from the
/// bulk of the detector are projected with the bulk's branch.
#[must_use]
pub fn project_to_2d(store: &GeometryStore) -> (Vec<f64>, Vec<f64>) {
    let qvals = store.qvals();
    let detd = store.detd();
    let ewald_rad = store.ewald_rad();

    let mean_qz = if qvals.is_empty() {
        0.0
    } else {
        qvals.iter().map(|q| q[2]).sum::<f64>() / qvals.len() as f64
    };
    let sign = if mean_qz > 0.0 { -1.0 } else { 1.0 };
    log::debug!(
        "projecting {} pixels with ewald_rad {} qz (mean qz = {mean_qz})",
        qvals.len(),
        if sign < 0.0 { "-" } else { "+" }
    );

    qvals
        .iter()
        .map(|q| {
            let scale = detd / (ewald_rad + sign * q[2]);
            (q[0] * scale, q[1] * scale)
        })
        .unzip()
}

/// Rounds plane coordinates to a non-negative integer grid.
///
/// Ties round to even. The smallest coordinate on each axis lands on 0.
#[must_use]
pub fn to_grid_coords(cx: &[f64], cy: &[f64]) -> (Vec<usize>, Vec<usize>) {
    (shift_round(cx), shift_round(cy))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn shift_round(values: &[f64]) -> Vec<usize> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    values
        .iter()
        .map(|&v| (v - min).round_ties_even() as usize)
        .collect()
}

/// Inputs for rebuilding pixel geometry from plane coordinates alone.
///
/// Used when only screen positions of the pixels are known, for example a
/// synthetic flat detector. All four inputs must be set before
/// [`ScreenGeometry::compute`].
#[derive(Debug, Clone, Default)]
pub struct ScreenGeometry {
    cx: Option<Vec<f64>>,
    cy: Option<Vec<f64>>,
    detd: Option<f64>,
    ewald_rad: Option<f64>,
}

impl ScreenGeometry {
    /// Creates a builder with no inputs set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plane x coordinate of every pixel.
    #[must_use]
    pub fn with_cx(mut self, cx: Vec<f64>) -> Self {
        self.cx = Some(cx);
        self
    }

    /// Sets the plane y coordinate of every pixel.
    #[must_use]
    pub fn with_cy(mut self, cy: Vec<f64>) -> Self {
        self.cy = Some(cy);
        self
    }

    /// Sets the detector distance, in the units of `cx` and `cy`.
    #[must_use]
    pub fn with_detd(mut self, detd: f64) -> Self {
        self.detd = Some(detd);
        self
    }

    /// Sets the Ewald sphere radius, in reciprocal-pixel units.
    #[must_use]
    pub fn with_ewald_rad(mut self, ewald_rad: f64) -> Self {
        self.ewald_rad = Some(ewald_rad);
        self
    }

    /// Computes `qvals` and `corr` from the plane coordinates.
    ///
    /// With `fac = sqrt(cx² + cy² + detd²)`:
    /// `q = ewald_rad * (cx / fac, cy / fac, detd / fac - 1)` and
    /// `corr = detd / fac³ * (1 - cx² / fac²)`.
    ///
    /// # Errors
    /// Returns `Configuration` naming every unset input, or `LengthMismatch`
    /// if `cx` and `cy` differ in length.
    pub fn compute(&self) -> Result<(Vec<[f64; 3]>, Vec<f64>)> {
        let mut missing = Vec::new();
        if self.cx.is_none() {
            missing.push("cx");
        }
        if self.cy.is_none() {
            missing.push("cy");
        }
        if self.detd.is_none() {
            missing.push("detd");
        }
        if self.ewald_rad.is_none() {
            missing.push("ewald_rad");
        }
        let (Some(cx), Some(cy), Some(detd), Some(ewald_rad)) =
            (&self.cx, &self.cy, self.detd, self.ewald_rad)
        else {
            return Err(Error::Configuration { missing });
        };
        Error::check_len("cy", cx.len(), cy.len())?;

        let mut qvals = Vec::with_capacity(cx.len());
        let mut corr = Vec::with_capacity(cx.len());
        for (&px, &py) in cx.iter().zip(cy) {
            let fac = (px * px + py * py + detd * detd).sqrt();
            qvals.push([
                px * ewald_rad / fac,
                py * ewald_rad / fac,
                ewald_rad * (detd / fac - 1.0),
            ]);
            corr.push(detd / fac.powi(3) * (1.0 - px * px / (fac * fac)));
        }
        Ok((qvals, corr))
    }

    /// Builds a store with every pixel marked `Good`.
    ///
    /// # Errors
    /// Same as [`ScreenGeometry::compute`].
    pub fn into_store(self) -> Result<GeometryStore> {
        let (qvals, corr) = self.compute()?;
        let num_pix = qvals.len();
        // compute() succeeded, so both scalars are set.
        let detd = self.detd.unwrap_or_default();
        let ewald_rad = self.ewald_rad.unwrap_or_default();
        GeometryStore::new(qvals, corr, vec![MaskCode::Good; num_pix], detd, ewald_rad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn store(qvals: Vec<[f64; 3]>) -> GeometryStore {
        let n = qvals.len();
        GeometryStore::new(qvals, vec![1.0; n], vec![MaskCode::Good; n], 100.0, 50.0).unwrap()
    }

    #[test]
    fn test_projection_positive_mean_branch() {
        let s = store(vec![[1.0, 2.0, 10.0], [3.0, -1.0, 10.0]]);
        let (cx, cy) = project_to_2d(&s);
        assert_relative_eq!(cx[0], 1.0 * 100.0 / 40.0);
        assert_relative_eq!(cy[0], 2.0 * 100.0 / 40.0);
        assert_relative_eq!(cx[1], 3.0 * 100.0 / 40.0);
    }

    #[test]
    fn test_projection_negative_mean_branch() {
        let s = store(vec![[1.0, 2.0, -10.0], [0.0, 0.0, 0.0]]);
        let (cx, cy) = project_to_2d(&s);
        assert_relative_eq!(cx[0], 1.0 * 100.0 / 40.0);
        assert_relative_eq!(cy[0], 2.0 * 100.0 / 40.0);
    }

    #[test]
    fn test_projection_branch_is_global() {
        // Mean qz is positive, so the qz < 0 pixel still uses (ewald_rad - qz).
        let s = store(vec![[1.0, 0.0, 20.0], [1.0, 0.0, -5.0]]);
        let (cx, _) = project_to_2d(&s);
        assert_relative_eq!(cx[0], 100.0 / 30.0);
        assert_relative_eq!(cx[1], 100.0 / 55.0);
    }

    #[test]
    fn test_grid_coords_anchor_at_zero() {
        let (x, y) = to_grid_coords(&[-2.4, 0.0, 3.2], &[5.0, 5.2, 7.9]);
        assert_eq!(x, vec![0, 2, 6]);
        assert_eq!(y, vec![0, 0, 3]);
    }

    #[test]
    fn test_grid_coords_ties_to_even() {
        let (x, _) = to_grid_coords(&[0.0, 0.5, 1.5, 2.5], &[0.0; 4]);
        assert_eq!(x, vec![0, 0, 2, 2]);
    }

    #[test]
    fn test_derive_rejects_pixel_on_sphere_pole() {
        // qz == -ewald_rad on the + branch divides by zero.
        let s = store(vec![[0.0, 0.0, 0.0], [1.0, 0.0, -50.0]]);
        assert_eq!(PixelCoords::derive(&s), Err(Error::NonFinite { pixel: 1 }));

        let s = store(vec![[f64::INFINITY, 0.0, 0.0]]);
        assert_eq!(PixelCoords::derive(&s), Err(Error::NonFinite { pixel: 0 }));
    }

    #[test]
    fn test_grid_shape() {
        let coords = PixelCoords {
            x: vec![0, 4, 2],
            y: vec![1, 0, 3],
            ..PixelCoords::default()
        };
        assert_eq!(coords.grid_shape(), (5, 4));
        assert_eq!(PixelCoords::default().grid_shape(), (0, 0));
    }

    #[test]
    fn test_screen_geometry_missing_fields() {
        let err = ScreenGeometry::new().with_cx(vec![0.0]).compute().unwrap_err();
        assert_eq!(
            err,
            Error::Configuration {
                missing: vec!["cy", "detd", "ewald_rad"]
            }
        );
        let message = err.to_string();
        assert!(message.contains("cy, detd, ewald_rad"));
        assert!(message.contains("reciprocal-pixel"));
    }

    #[test]
    fn test_screen_geometry_center_pixel() {
        let (qvals, corr) = ScreenGeometry::new()
            .with_cx(vec![0.0, 30.0])
            .with_cy(vec![0.0, 40.0])
            .with_detd(120.0)
            .with_ewald_rad(500.0)
            .compute()
            .unwrap();
        assert_relative_eq!(qvals[0][0], 0.0);
        assert_relative_eq!(qvals[0][2], 0.0);
        assert_relative_eq!(corr[0], 1.0 / (120.0 * 120.0));

        let fac: f64 = 130.0;
        assert_relative_eq!(qvals[1][0], 30.0 * 500.0 / fac);
        assert_relative_eq!(qvals[1][1], 40.0 * 500.0 / fac);
        assert_relative_eq!(qvals[1][2], 500.0 * (120.0 / fac - 1.0));
        assert_relative_eq!(corr[1], 120.0 / fac.powi(3) * (1.0 - 900.0 / (fac * fac)));
    }

    #[test]
    fn test_screen_geometry_round_trips_through_projection() {
        let cx = vec![-12.0, 0.0, 7.5];
        let cy = vec![3.0, -4.0, 9.0];
        let s = ScreenGeometry::new()
            .with_cx(cx.clone())
            .with_cy(cy.clone())
            .with_detd(80.0)
            .with_ewald_rad(300.0)
            .into_store()
            .unwrap();
        assert!(s.raw_mask().iter().all(|&c| c == MaskCode::Good));

        let (px, py) = project_to_2d(&s);
        for i in 0..3 {
            assert_relative_eq!(px[i], cx[i], epsilon = 1e-9);
            assert_relative_eq!(py[i], cy[i], epsilon = 1e-9);
        }
    }
}
