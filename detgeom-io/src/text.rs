//! Whitespace-delimited text detector files.
//!
//! ```text
//! <num_pix> <detd> <ewald_rad>
//! <qx> <qy> <qz> <corr> <mask>      (num_pix rows, file order)
//! ```

use crate::{Error, Result};
use detgeom_core::{GeometryStore, MaskCode};
use std::io::Write;

const ROW_TOKENS: usize = 5;

/// Parses a text detector table.
///
/// Blank lines are ignored. All columns are collected before the store is
/// built, so a failed parse never yields a partially filled store.
///
/// # Errors
/// Returns `Header` for a header without exactly three tokens and `Parse`
/// for malformed rows or a row count that differs from `num_pix`.
pub fn parse_text(content: &str) -> Result<GeometryStore> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let (header_line, header) = lines
        .next()
        .ok_or_else(|| Error::parse(1, "empty detector file"))?;
    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(Error::Header {
            found: tokens.len(),
        });
    }
    let num_pix: u32 = parse_token(tokens[0], header_line, "num_pix")?;
    let detd: f64 = parse_token(tokens[1], header_line, "detd")?;
    let ewald_rad: f64 = parse_token(tokens[2], header_line, "ewald_rad")?;
    let num_pix = num_pix as usize;

    // The header count is untrusted until the rows are read.
    let capacity = num_pix.min(content.lines().count());
    let mut qvals = Vec::with_capacity(capacity);
    let mut corr = Vec::with_capacity(capacity);
    let mut raw_mask = Vec::with_capacity(capacity);

    for (line_no, line) in lines {
        if qvals.len() == num_pix {
            return Err(Error::parse(
                line_no,
                format!("more pixel rows than the {num_pix} declared in the header"),
            ));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != ROW_TOKENS {
            return Err(Error::parse(
                line_no,
                format!(
                    "expected {ROW_TOKENS} tokens (qx qy qz corr mask), found {}",
                    tokens.len()
                ),
            ));
        }
        qvals.push([
            parse_token(tokens[0], line_no, "qx")?,
            parse_token(tokens[1], line_no, "qy")?,
            parse_token(tokens[2], line_no, "qz")?,
        ]);
        corr.push(parse_token(tokens[3], line_no, "corr")?);
        let code: u8 = parse_token(tokens[4], line_no, "mask")?;
        let code =
            MaskCode::try_from(code).map_err(|e| Error::parse(line_no, e.to_string()))?;
        raw_mask.push(code);
    }

    if qvals.len() != num_pix {
        return Err(Error::parse(
            header_line,
            format!(
                "header declares {num_pix} pixels but {} rows follow",
                qvals.len()
            ),
        ));
    }

    Ok(GeometryStore::new(qvals, corr, raw_mask, detd, ewald_rad)?)
}

/// Writes a store as a text table.
///
/// The background array has no column in this format and is dropped with a
/// warning.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_text<W: Write>(writer: &mut W, store: &GeometryStore) -> Result<()> {
    if store.background().is_some() {
        log::warn!("text detector format has no background column; background not written");
    }

    writeln!(
        writer,
        "{} {:.6} {:.6}",
        store.num_pix(),
        store.detd(),
        store.ewald_rad()
    )?;
    for ((q, &c), &code) in store
        .qvals()
        .iter()
        .zip(store.corr())
        .zip(store.raw_mask())
    {
        writeln!(
            writer,
            "{:>21} {:>21} {:>21} {:>21} {}",
            format_sci(q[0]),
            format_sci(q[1]),
            format_sci(q[2]),
            format_sci(c),
            code.as_u8()
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_token<T: std::str::FromStr>(token: &str, line: usize, name: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| Error::parse(line, format!("invalid {name} value '{token}'")))
}

/// Formats like C's `%.15e`: 16 significant digits and a signed exponent of
/// at least two digits.
fn format_sci(value: f64) -> String {
    let formatted = format!("{value:.15e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => formatted,
        },
        None => formatted,
    }
}
