//! Writers for assembled 2D frames.

use crate::Result;
use detgeom_core::AssembledFrame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for assembled frames.
///
/// Rows follow the first grid axis (`x`), columns the second (`y`).
pub struct FrameWriter {
    writer: BufWriter<File>,
}

impl FrameWriter {
    /// Creates a new frame writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes the frame as CSV, one row per `x`; invalid cells are `nan`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_csv(&mut self, frame: &AssembledFrame) -> Result<()> {
        for (values, valid) in frame.values().rows().into_iter().zip(frame.valid().rows()) {
            let line = values
                .iter()
                .zip(valid.iter())
                .map(|(value, &ok)| {
                    if ok {
                        value.to_string()
                    } else {
                        "nan".to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(",");
            writeln!(self.writer, "{line}")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes the frame as row-major little-endian f64; invalid cells are NaN.
    ///
    /// Format: `width * height` values, 8 bytes each, no header.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_binary(&mut self, frame: &AssembledFrame) -> Result<()> {
        let filled = frame.filled(f64::NAN);
        for value in &filled {
            self.writer.write_all(&value.to_le_bytes())?;
        }

        self.writer.flush()?;
        Ok(())
    }
}

/// Writes a frame, choosing CSV for a `.csv` extension and binary otherwise.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_frame<P: AsRef<Path>>(path: P, frame: &AssembledFrame) -> Result<()> {
    let path = path.as_ref();
    let csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let mut writer = FrameWriter::create(path)?;
    if csv {
        writer.write_csv(frame)
    } else {
        writer.write_binary(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detgeom_core::{Detector, GeometryStore, MaskCode, MaskPolicy};
    use tempfile::{Builder, NamedTempFile};

    // Three pixels on a 3x1 grid; the middle one is bad.
    fn frame() -> AssembledFrame {
        let store = GeometryStore::new(
            vec![[-1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            vec![1.0; 3],
            vec![MaskCode::Good, MaskCode::Bad, MaskCode::Good],
            10.0,
            10.0,
        )
        .unwrap();
        Detector::new(store, MaskPolicy::new())
            .unwrap()
            .assemble(&[1.5, 9.0, -2.0], false)
            .unwrap()
    }

    #[test]
    fn test_write_frame_csv() {
        let file = Builder::new().suffix(".csv").tempfile().unwrap();
        write_frame(file.path(), &frame()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "1.5\nnan\n-2\n");
    }

    #[test]
    fn test_write_frame_binary() {
        let file = NamedTempFile::new().unwrap();
        write_frame(file.path(), &frame()).unwrap();

        let data = std::fs::read(file.path()).unwrap();
        assert_eq!(data.len(), 3 * 8);
        let middle = f64::from_le_bytes(data[8..16].try_into().unwrap());
        assert!(middle.is_nan());
        let last = f64::from_le_bytes(data[16..24].try_into().unwrap());
        assert_eq!(last, -2.0);
    }
}
