//! Per-pixel value arrays (backgrounds, frames to assemble).

use crate::format::FileFormat;
use crate::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

const F64_BYTES: usize = std::mem::size_of::<f64>();

/// Loads one `f64` per pixel.
///
/// HDF5 containers are read from the `background` dataset, falling back to
/// `data`. Any other file is taken as raw little-endian `f64` values.
///
/// # Errors
/// Returns `RawLength` for a raw file whose size is not a multiple of 8,
/// `Unsupported` for a container when HDF5 support is not compiled in, and
/// I/O errors from opening or mapping the file.
pub fn load_array<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let path = path.as_ref();
    match FileFormat::detect(path)? {
        FileFormat::Hdf5 => read_container_array(path),
        FileFormat::Text => read_raw_f64(path),
    }
}

#[cfg(feature = "hdf5")]
fn read_container_array(path: &Path) -> Result<Vec<f64>> {
    crate::hdf5::read_array(path)
}

#[cfg(not(feature = "hdf5"))]
fn read_container_array(path: &Path) -> Result<Vec<f64>> {
    Err(Error::Unsupported(format!(
        "{} is an HDF5 file; rebuild with the `hdf5` feature",
        path.display()
    )))
}

fn read_raw_f64(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    if len % F64_BYTES as u64 != 0 {
        return Err(Error::RawLength(len));
    }

    // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file)? };

    let values = mmap
        .chunks_exact(F64_BYTES)
        .map(|chunk| {
            let mut bytes = [0u8; F64_BYTES];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect::<Vec<_>>();
    log::debug!("mapped {} values from {}", values.len(), path.display());
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_raw_little_endian() {
        let mut file = NamedTempFile::new().unwrap();
        for value in [1.5_f64, -2.0, 1.0e-300] {
            file.write_all(&value.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        assert_eq!(load_array(file.path()).unwrap(), vec![1.5, -2.0, 1.0e-300]);
    }

    #[test]
    fn test_raw_partial_value() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 12]).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            load_array(file.path()),
            Err(Error::RawLength(12))
        ));
    }

    #[test]
    fn test_empty_raw_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(load_array(file.path()).unwrap().is_empty());
    }
}
