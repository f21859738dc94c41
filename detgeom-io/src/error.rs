//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header line without exactly three tokens.
    #[error("invalid detector header: expected 3 tokens (num_pix detd ewald_rad), found {found}")]
    Header { found: usize },

    /// Malformed content at a given line.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Neither an HDF5 container nor a text table.
    #[error("unrecognized file format: {0}")]
    UnrecognizedFormat(String),

    /// Container file encountered without container support compiled in.
    #[error("unsupported format: {0}")]
    Unsupported(String),

    /// Required dataset absent from a container file.
    #[error("missing dataset: {0}")]
    MissingDataset(String),

    /// Raw binary array with a byte length not divisible by 8.
    #[error("raw array length {0} bytes is not a whole number of f64 values")]
    RawLength(u64),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] detgeom_core::Error),
}

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
