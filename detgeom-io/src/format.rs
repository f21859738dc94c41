//! On-disk format detection.

use crate::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// HDF5 superblock signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Detector file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Whitespace-delimited table.
    Text,
    /// HDF5 container with named datasets.
    Hdf5,
}

impl FileFormat {
    /// Detects the format of an existing file.
    ///
    /// The HDF5 signature in the first 8 bytes or an `.h5`/`.hdf5` extension
    /// selects the container; anything else is treated as text.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut head = Vec::with_capacity(HDF5_SIGNATURE.len());
        File::open(path)?
            .take(HDF5_SIGNATURE.len() as u64)
            .read_to_end(&mut head)?;
        if head == HDF5_SIGNATURE || has_container_extension(path) {
            Ok(Self::Hdf5)
        } else {
            Ok(Self::Text)
        }
    }

    /// Chooses the output format from a path's extension.
    #[must_use]
    pub fn for_output<P: AsRef<Path>>(path: P) -> Self {
        if has_container_extension(path.as_ref()) {
            Self::Hdf5
        } else {
            Self::Text
        }
    }
}

fn has_container_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("h5") || ext.eq_ignore_ascii_case("hdf5"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn test_signature_wins_over_extension() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&HDF5_SIGNATURE).unwrap();
        file.write_all(&[0; 16]).unwrap();
        assert_eq!(FileFormat::detect(file.path()).unwrap(), FileFormat::Hdf5);
    }

    #[test]
    fn test_extension_selects_container() {
        let file = Builder::new().suffix(".h5").tempfile().unwrap();
        assert_eq!(FileFormat::detect(file.path()).unwrap(), FileFormat::Hdf5);
        assert_eq!(FileFormat::for_output("det.HDF5"), FileFormat::Hdf5);
        assert_eq!(FileFormat::for_output("det.dat"), FileFormat::Text);
    }

    #[test]
    fn test_short_text_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "1 2").unwrap();
        assert_eq!(FileFormat::detect(file.path()).unwrap(), FileFormat::Text);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileFormat::detect("/nonexistent/detector.dat"),
            Err(crate::Error::Io(_))
        ));
    }
}
