//! Detector facade: a geometry store with its derived views and caches.

use crate::assemble::{self, AssembledFrame, ZoomBounds};
use crate::geometry::PixelCoords;
use crate::mask::MaskPolicy;
use crate::remask;
use crate::store::GeometryStore;
use crate::symmetry::SymmetryGrid;
use crate::Result;

/// A detector ready for assembly.
///
/// Owns the [`GeometryStore`] and keeps the plane/grid coordinates and the
/// usable mask in sync with it. Two caches are built lazily:
///
/// - the per-pixel q-radius used by [`Detector::remask`], dropped whenever
///   `qvals` change;
/// - the folded [`SymmetryGrid`], dropped whenever the coordinates or the
///   usable mask change.
#[derive(Debug, Clone)]
pub struct Detector {
    store: GeometryStore,
    policy: MaskPolicy,
    coords: PixelCoords,
    mask: Vec<bool>,
    q_radius: Option<Vec<f64>>,
    symmetry: Option<SymmetryGrid>,
}

impl Detector {
    /// Derives coordinates and the usable mask for `store`.
    ///
    /// A disabled `policy` resets the store's raw mask to all `Good`.
    ///
    /// # Errors
    /// Returns `NonFinite` if a pixel cannot be projected onto the plane.
    pub fn new(mut store: GeometryStore, policy: MaskPolicy) -> Result<Self> {
        let coords = PixelCoords::derive(&store)?;
        let mask = policy.resolve(store.raw_mask_mut());
        let (nx, ny) = coords.grid_shape();
        log::debug!(
            "detector with {} pixels on a {nx}x{ny} grid, {} usable",
            store.num_pix(),
            mask.iter().filter(|&&m| m).count()
        );
        Ok(Self {
            store,
            policy,
            coords,
            mask,
            q_radius: None,
            symmetry: None,
        })
    }

    /// Underlying pixel geometry.
    #[must_use]
    pub fn store(&self) -> &GeometryStore {
        &self.store
    }

    /// Releases the pixel geometry, including any remask edits.
    #[must_use]
    pub fn into_store(self) -> GeometryStore {
        self.store
    }

    #[must_use]
    pub fn num_pix(&self) -> usize {
        self.store.num_pix()
    }

    /// Plane and grid coordinates.
    #[must_use]
    pub fn coords(&self) -> &PixelCoords {
        &self.coords
    }

    /// Usable mask under the current policy.
    #[must_use]
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Number of usable pixels.
    #[must_use]
    pub fn usable_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    #[must_use]
    pub fn policy(&self) -> MaskPolicy {
        self.policy
    }

    /// Full (unzoomed) assembled grid shape.
    #[must_use]
    pub fn grid_shape(&self) -> (usize, usize) {
        self.coords.grid_shape()
    }

    /// Switches the mask policy and re-resolves the usable mask.
    ///
    /// A disabled `policy` resets the store's raw mask to all `Good`.
    pub fn set_policy(&mut self, policy: MaskPolicy) {
        self.policy = policy;
        self.mask = self.policy.resolve(self.store.raw_mask_mut());
        self.symmetry = None;
    }

    /// Replaces `qvals` and rederives everything that depends on them.
    ///
    /// On error the detector keeps its previous `qvals`.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if the pixel count would change, or
    /// `NonFinite` if a new pixel cannot be projected onto the plane.
    pub fn set_qvals(&mut self, qvals: Vec<[f64; 3]>) -> Result<()> {
        let previous = self.store.qvals().to_vec();
        self.store.set_qvals(qvals)?;
        match PixelCoords::derive(&self.store) {
            Ok(coords) => {
                self.coords = coords;
                self.invalidate_caches();
                Ok(())
            }
            Err(e) => {
                self.store.set_qvals(previous)?;
                Err(e)
            }
        }
    }

    /// Drops the q-radius and symmetry caches.
    pub fn invalidate_caches(&mut self) {
        self.q_radius = None;
        self.symmetry = None;
    }

    /// Per-pixel q-radius, computed on first use.
    pub fn q_radius(&mut self) -> &[f64] {
        self.q_radius.get_or_insert_with(|| self.store.q_radius())
    }

    /// Zoom bounds of the plain assembled image.
    ///
    /// # Errors
    /// Returns `EmptyMask` if no pixel is usable.
    pub fn zoom_bounds(&self) -> Result<ZoomBounds> {
        assemble::zoom_bounds(&self.coords, &self.mask)
    }

    /// Assembles `data` onto the detector grid.
    ///
    /// # Errors
    /// See [`assemble::assemble`].
    pub fn assemble(&self, data: &[f64], zoomed: bool) -> Result<AssembledFrame> {
        assemble::assemble(&self.coords, &self.mask, data, zoomed)
    }

    /// Folded grid, built on first use or when `force` is set.
    ///
    /// # Errors
    /// See [`SymmetryGrid::build`].
    pub fn symmetry_grid(&mut self, force: bool) -> Result<&SymmetryGrid> {
        let grid = cached_grid(&mut self.symmetry, &self.coords, &self.mask, force)?;
        Ok(grid)
    }

    /// Assembles `data` onto the folded, centro-symmetric grid.
    ///
    /// The folded geometry is reused across calls unless `force` is set.
    ///
    /// # Errors
    /// See [`SymmetryGrid::assemble`].
    pub fn assemble_symmetric(
        &mut self,
        data: &[f64],
        zoomed: bool,
        force: bool,
    ) -> Result<AssembledFrame> {
        let grid = cached_grid(&mut self.symmetry, &self.coords, &self.mask, force)?;
        grid.assemble(&self.mask, data, zoomed)
    }

    /// Marks `Good` pixels beyond `qradius` as `Bad` and re-resolves the mask.
    ///
    /// Returns the number of pixels newly marked. The new codes stay in the
    /// store under every policy; with a disabled policy they are recorded but
    /// every pixel remains usable.
    ///
    /// # Errors
    /// Propagates length errors from [`remask::remask`].
    pub fn remask(&mut self, qradius: f64) -> Result<usize> {
        let radius = self
            .q_radius
            .get_or_insert_with(|| self.store.q_radius());
        let changed = remask::remask(&mut self.store, radius, qradius)?;
        if changed > 0 {
            self.refresh_mask();
        }
        if self.usable_count() == 0 && self.num_pix() > 0 {
            log::warn!("remask at q = {qradius} left no usable pixels");
        }
        Ok(changed)
    }

    fn refresh_mask(&mut self) {
        self.mask = self.policy.usable(self.store.raw_mask());
        self.symmetry = None;
    }
}

fn cached_grid<'a>(
    slot: &'a mut Option<SymmetryGrid>,
    coords: &PixelCoords,
    mask: &[bool],
    force: bool,
) -> Result<&'a SymmetryGrid> {
    let grid = match slot.take() {
        Some(grid) if !force => grid,
        _ => SymmetryGrid::build(coords, mask)?,
    };
    Ok(slot.insert(grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::MaskCode;
    use crate::Error;
    use approx::assert_relative_eq;

    fn detector(policy: MaskPolicy) -> Detector {
        let store = GeometryStore::new(
            vec![[-2.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
            vec![1.0; 4],
            vec![MaskCode::Good, MaskCode::Good, MaskCode::Bad, MaskCode::Good],
            10.0,
            10.0,
        )
        .unwrap();
        Detector::new(store, policy).unwrap()
    }

    fn two_pixels(policy: MaskPolicy) -> Detector {
        let store = GeometryStore::new(
            vec![[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]],
            vec![1.0; 2],
            vec![MaskCode::Good; 2],
            10.0,
            10.0,
        )
        .unwrap();
        Detector::new(store, policy).unwrap()
    }

    #[test]
    fn test_policy_switch_refreshes_mask() {
        let mut det = detector(MaskPolicy::new());
        assert_eq!(det.mask(), &[true, true, false, true]);
        det.set_policy(MaskPolicy::new().with_keep_bad(true));
        assert_eq!(det.mask(), &[true, true, true, true]);
        assert_eq!(det.store().raw_mask()[2], MaskCode::Bad);
    }

    #[test]
    fn test_symmetry_cache_reused_until_invalidated() {
        let mut det = detector(MaskPolicy::new());
        let grid = det.symmetry_grid(false).unwrap();
        assert_eq!(grid.shape(), (5, 3));
        assert_eq!(grid.valid().iter().filter(|&&v| v).count(), 3);

        det.set_policy(MaskPolicy::new().with_keep_bad(true));
        assert!(det.symmetry.is_none());
        let grid = det.symmetry_grid(false).unwrap();
        assert_eq!(grid.valid().iter().filter(|&&v| v).count(), 5);

        det.q_radius();
        det.set_qvals(vec![[0.0; 3]; 4]).unwrap();
        assert!(det.symmetry.is_none());
        assert!(det.q_radius.is_none());
    }

    #[test]
    fn test_assemble_symmetric_averages_mirror_pair() {
        let mut det = detector(MaskPolicy::new());
        let frame = det
            .assemble_symmetric(&[2.0, 6.0, 100.0, 1.0], false, false)
            .unwrap();
        assert_eq!(frame.shape(), (5, 3));
        assert_relative_eq!(frame.get(0, 1).unwrap(), 4.0);
        assert_relative_eq!(frame.get(4, 1).unwrap(), 4.0);
        assert_relative_eq!(frame.get(2, 1).unwrap(), 1.0);
        assert_eq!(frame.get(2, 2), None);
    }

    #[test]
    fn test_remask_uses_cached_radius() {
        let mut det = detector(MaskPolicy::new());
        assert_eq!(det.remask(1.5).unwrap(), 2);
        assert_eq!(det.mask(), &[false, false, false, true]);
        assert_eq!(det.q_radius().len(), 4);
        assert_eq!(det.remask(1.5).unwrap(), 0);
    }

    #[test]
    fn test_forced_rebuild_replaces_stale_grid() {
        let mut det = detector(MaskPolicy::new());
        let stale = SymmetryGrid::build(&det.coords, &[false; 4]).unwrap();
        det.symmetry = Some(stale);

        let cached = det.symmetry_grid(false).unwrap();
        assert_eq!(cached.valid().iter().filter(|&&v| v).count(), 0);
        let rebuilt = det.symmetry_grid(true).unwrap();
        assert_eq!(rebuilt.valid().iter().filter(|&&v| v).count(), 3);

        det.symmetry = Some(SymmetryGrid::build(&det.coords, &[false; 4]).unwrap());
        let data = [2.0, 6.0, 100.0, 1.0];
        assert_eq!(
            det.assemble_symmetric(&data, false, false)
                .unwrap()
                .valid_count(),
            0
        );
        let frame = det.assemble_symmetric(&data, false, true).unwrap();
        assert_relative_eq!(frame.get(0, 1).unwrap(), 4.0);
        assert_eq!(frame.valid_count(), 3);
    }

    #[test]
    fn test_remask_keeps_codes_under_disabled_policy() {
        let mut det = two_pixels(MaskPolicy::new().with_enabled(false));
        assert_eq!(det.remask(1.0).unwrap(), 1);
        assert_eq!(det.store().raw_mask(), &[MaskCode::Good, MaskCode::Bad]);
        assert_eq!(det.mask(), &[true, true]);

        // Enabling the policy afterwards applies the recorded code.
        det.set_policy(MaskPolicy::new());
        assert_eq!(det.mask(), &[true, false]);
    }

    #[test]
    fn test_pixel_on_sphere_pole_is_rejected() {
        let store = GeometryStore::new(
            vec![[1.0, 0.0, -10.0], [0.0, 0.0, 0.0]],
            vec![1.0; 2],
            vec![MaskCode::Good; 2],
            10.0,
            10.0,
        )
        .unwrap();
        assert!(matches!(
            Detector::new(store, MaskPolicy::new()),
            Err(Error::NonFinite { pixel: 0 })
        ));

        let mut det = two_pixels(MaskPolicy::new());
        let before = det.store().qvals().to_vec();
        assert_eq!(
            det.set_qvals(vec![[0.0, 0.0, 0.0], [1.0, 0.0, -10.0]]),
            Err(Error::NonFinite { pixel: 1 })
        );
        assert_eq!(det.store().qvals(), &before[..]);
    }

    #[test]
    fn test_disabled_policy_ignores_codes() {
        let det = detector(MaskPolicy::new().with_enabled(false));
        assert_eq!(det.usable_count(), 4);
        assert!(det.store().raw_mask().iter().all(|&c| c == MaskCode::Good));
    }
}
