//! detgeom-core: Pixel geometry of diffraction area detectors.
//!
//! This crate converts between three views of the same physical pixels:
//! the flat per-pixel list of reciprocal-space coordinates with correction
//! factors and mask codes, the 2D integer grid used to render an assembled
//! image, and the folded centro-symmetric grid.
//!

pub mod assemble;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod remask;
pub mod store;
pub mod symmetry;

pub use assemble::{AssembledFrame, ZoomBounds};
pub use detector::Detector;
pub use error::{Error, Result};
pub use geometry::{project_to_2d, to_grid_coords, PixelCoords, ScreenGeometry};
pub use mask::{MaskCode, MaskPolicy};
pub use store::{GeometryStore, LoadOptions, StoreParts};
pub use symmetry::SymmetryGrid;
