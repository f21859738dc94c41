//! detgeom-io: Detector file codecs for detgeom.
//!
//! Reads and writes detector geometry as whitespace-delimited text tables or
//! HDF5 containers (feature `hdf5`), loads per-pixel value arrays, and writes
//! assembled frames.
//!

mod array;
mod error;
pub mod format;
mod frame;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod text;

pub use array::load_array;
pub use error::{Error, Result};
pub use format::FileFormat;
pub use frame::{write_frame, FrameWriter};

use detgeom_core::{Detector, GeometryStore, LoadOptions, MaskPolicy};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Parses a detector file and applies `options`.
///
/// The format is sniffed from the file signature and extension.
///
/// # Errors
/// Returns `UnrecognizedFormat` for files that are neither a container nor
/// UTF-8 text, `Unsupported` for containers when HDF5 support is not
/// compiled in, and codec errors for malformed content.
pub fn parse<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<GeometryStore> {
    let path = path.as_ref();
    let mut store = match FileFormat::detect(path)? {
        FileFormat::Hdf5 => read_container(path)?,
        FileFormat::Text => {
            let bytes = std::fs::read(path)?;
            let content = String::from_utf8(bytes).map_err(|_| {
                Error::UnrecognizedFormat(format!(
                    "{} is neither an HDF5 container nor a text table",
                    path.display()
                ))
            })?;
            text::parse_text(&content)?
        }
    };
    store.apply(options);
    log::debug!(
        "loaded {} pixels from {} (detd {}, ewald_rad {})",
        store.num_pix(),
        path.display(),
        store.detd(),
        store.ewald_rad()
    );
    Ok(store)
}

/// Writes a store, choosing the format from the output extension.
///
/// # Errors
/// Returns a `Core` state error for an empty store, `Unsupported` for a
/// container path without HDF5 support, and I/O errors.
pub fn write<P: AsRef<Path>>(store: &GeometryStore, path: P) -> Result<()> {
    let path = path.as_ref();
    store.ensure_populated()?;
    match FileFormat::for_output(path) {
        FileFormat::Hdf5 => write_container(store, path),
        FileFormat::Text => {
            let mut writer = BufWriter::new(File::create(path)?);
            text::write_text(&mut writer, store)
        }
    }
}

/// Parses a detector file and prepares it for assembly.
///
/// # Errors
/// Returns any error from [`parse`], or a `Core` `NonFinite` error when a
/// pixel cannot be projected onto the detector plane.
pub fn load_detector<P: AsRef<Path>>(
    path: P,
    options: LoadOptions,
    policy: MaskPolicy,
) -> Result<Detector> {
    Ok(Detector::new(parse(path, options)?, policy)?)
}

#[cfg(feature = "hdf5")]
fn read_container(path: &Path) -> Result<GeometryStore> {
    hdf5::read_hdf5(path)
}

#[cfg(not(feature = "hdf5"))]
fn read_container(path: &Path) -> Result<GeometryStore> {
    Err(Error::Unsupported(format!(
        "{} is an HDF5 file; rebuild with the `hdf5` feature",
        path.display()
    )))
}

#[cfg(feature = "hdf5")]
fn write_container(store: &GeometryStore, path: &Path) -> Result<()> {
    hdf5::write_hdf5(path, store)
}

#[cfg(not(feature = "hdf5"))]
fn write_container(_store: &GeometryStore, path: &Path) -> Result<()> {
    Err(Error::Unsupported(format!(
        "cannot write {}; rebuild with the `hdf5` feature",
        path.display()
    )))
}
