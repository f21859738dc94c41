//! Resolution cutoff applied to the raw mask.

use crate::mask::MaskCode;
use crate::store::GeometryStore;
use crate::{Error, Result};

/// Marks every `Good` pixel with `q_radius[i] > qradius` as `Bad`.
///
/// Pixels that are already `Bad` or `Irrelevant` keep their code, so applying
/// the same or a larger radius again changes nothing. Returns the number of
/// pixels newly marked.
///
/// # Errors
/// Returns `LengthMismatch` if `q_radius` does not match the pixel count.
pub fn remask(store: &mut GeometryStore, q_radius: &[f64], qradius: f64) -> Result<usize> {
    Error::check_len("q_radius", store.num_pix(), q_radius.len())?;

    let mut changed = 0;
    for (code, &r) in store.raw_mask_mut().iter_mut().zip(q_radius) {
        if *code == MaskCode::Good && r > qradius {
            *code = MaskCode::Bad;
            changed += 1;
        }
    }
    log::debug!("remask at q = {qradius}: {changed} pixels marked bad");
    Ok(changed)
}
