//! HDF5 detector containers.
//!
//! Layout (all datasets at the file root):
//!
//! | name        | type | shape       |
//! |-------------|------|-------------|
//! | `qx` `qy` `qz` `corr` | f64 | `(num_pix,)` |
//! | `mask`      | u8   | `(num_pix,)` |
//! | `detd` `ewald_rad` | f64 | scalar |
//! | `background` | f64 | `(num_pix,)`, optional |

use crate::{Error, Result};
use detgeom_core::{GeometryStore, MaskCode};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{File, Group};
use ndarray::ArrayView1;
use std::path::Path;
use std::str::FromStr;

const FORMAT_VERSION: &str = "1.0";

/// Reads a detector container.
///
/// # Errors
/// Returns `MissingDataset` when a required dataset is absent, `Core` when
/// column lengths disagree or a mask code is out of range, and `Hdf5` for
/// library failures.
pub fn read_hdf5<P: AsRef<Path>>(path: P) -> Result<GeometryStore> {
    let file = File::open(path)?;

    let qx = read_dataset_vec::<f64>(&file, "qx")?;
    let qy = read_dataset_vec::<f64>(&file, "qy")?;
    let qz = read_dataset_vec::<f64>(&file, "qz")?;
    let num_pix = qx.len();
    for (name, column) in [("qy", &qy), ("qz", &qz)] {
        if column.len() != num_pix {
            return Err(detgeom_core::Error::LengthMismatch {
                field: name,
                expected: num_pix,
                actual: column.len(),
            }
            .into());
        }
    }
    let qvals = qx
        .into_iter()
        .zip(qy)
        .zip(qz)
        .map(|((x, y), z)| [x, y, z])
        .collect();

    let corr = read_dataset_vec::<f64>(&file, "corr")?;
    let raw_mask = read_dataset_vec::<u8>(&file, "mask")?
        .into_iter()
        .map(MaskCode::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let detd = read_scalar(&file, "detd")?;
    let ewald_rad = read_scalar(&file, "ewald_rad")?;

    let mut store = GeometryStore::new(qvals, corr, raw_mask, detd, ewald_rad)?;
    if let Some(background) = read_dataset_vec_opt::<f64>(&file, "background")? {
        store.set_background(Some(background))?;
    }
    log::debug!("read {} pixels from HDF5 container", store.num_pix());
    Ok(store)
}

/// Writes a detector container, replacing any existing file.
///
/// # Errors
/// Returns an error if the file or any dataset cannot be created.
pub fn write_hdf5<P: AsRef<Path>>(path: P, store: &GeometryStore) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "detgeom_format_version", FORMAT_VERSION)?;

    for (axis, name) in ["qx", "qy", "qz"].into_iter().enumerate() {
        let column: Vec<f64> = store.qvals().iter().map(|q| q[axis]).collect();
        write_dataset(&file, name, &column)?;
    }
    write_dataset(&file, "corr", store.corr())?;
    let codes: Vec<u8> = store.raw_mask().iter().map(|code| code.as_u8()).collect();
    write_dataset(&file, "mask", &codes)?;
    write_scalar(&file, "detd", store.detd())?;
    write_scalar(&file, "ewald_rad", store.ewald_rad())?;
    if let Some(background) = store.background() {
        write_dataset(&file, "background", background)?;
    }
    Ok(())
}

/// Reads a per-pixel array from a container: `background`, else `data`.
///
/// # Errors
/// Returns `MissingDataset` if neither dataset exists.
pub fn read_array<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    for name in ["background", "data"] {
        if let Some(values) = read_dataset_vec_opt::<f64>(&file, name)? {
            return Ok(values);
        }
    }
    Err(Error::MissingDataset("background or data".to_string()))
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    read_dataset_vec_opt(group, name)?.ok_or_else(|| Error::MissingDataset(name.to_string()))
}

fn read_dataset_vec_opt<T: H5Type>(group: &Group, name: &str) -> Result<Option<Vec<T>>> {
    if !group.link_exists(name) {
        return Ok(None);
    }
    Ok(Some(group.dataset(name)?.read_raw::<T>()?))
}

// Accepts both true scalars and single-element datasets.
fn read_scalar(group: &Group, name: &str) -> Result<f64> {
    read_dataset_vec::<f64>(group, name)?
        .first()
        .copied()
        .ok_or_else(|| Error::MissingDataset(format!("{name} (empty dataset)")))
}

fn write_dataset<T: H5Type>(group: &Group, name: &str, data: &[T]) -> Result<()> {
    group
        .new_dataset::<T>()
        .shape((data.len(),))
        .create(name)?
        .write(ArrayView1::from(data))?;
    Ok(())
}

fn write_scalar(group: &Group, name: &str, value: f64) -> Result<()> {
    group
        .new_dataset::<f64>()
        .shape(())
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| Error::Unsupported(format!("invalid utf-8 attribute: {e}")))?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}
