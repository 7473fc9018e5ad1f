use std::ffi::CString;
use std::path::Path;

use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use thiserror::Error;

use super::header::{format_cards, is_commentary, CardError, CARD_LEN};
use super::model::{Header, HeaderValue};

/// Keys cfitsio writes itself when it creates the primary image.
const STRUCTURAL_KEYS: [&str; 5] = ["SIMPLE", "BITPIX", "NAXIS", "EXTEND", "END"];

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("axis sizes {axes:?} describe {expected} voxels but {actual} values were given")]
    ShapeMismatch {
        axes: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("invalid header card: {0}")]
    Card(#[from] CardError),
    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),
    #[error("cfitsio rejected card '{card}' (status {status})")]
    Record { card: String, status: i32 },
}

/// Write a single-HDU FITS cube holding `values` as BITPIX -32, replacing
/// any existing file.
///
/// `axis_sizes` are in FITS order (`NAXIS1` first) and `values` in on-disk
/// order. Entries of `extra` follow the cards cfitsio generates; structural
/// keys in `extra` are ignored.
pub fn write_cube(
    path: &Path,
    axis_sizes: &[usize],
    values: &[f32],
    extra: &Header,
) -> Result<(), WriteError> {
    let expected: usize = axis_sizes.iter().product();
    if axis_sizes.is_empty() || expected != values.len() {
        return Err(WriteError::ShapeMismatch {
            axes: axis_sizes.to_vec(),
            expected,
            actual: values.len(),
        });
    }

    // fitsio takes the shape slowest axis first.
    let shape: Vec<usize> = axis_sizes.iter().rev().copied().collect();
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &shape,
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;

    for (key, value) in extra.iter() {
        if STRUCTURAL_KEYS.contains(&key) || is_axis_key(key) {
            continue;
        }
        let plain = key.len() <= 8 && !key.contains(' ') && !is_commentary(key);
        match value {
            HeaderValue::Integer(i) if plain => hdu.write_key(&mut fptr, key, *i)?,
            HeaderValue::Float(v) if plain && v.is_finite() => hdu.write_key(&mut fptr, key, *v)?,
            HeaderValue::Text(s) if plain && format_cards(key, value)?.len() == 1 => {
                hdu.write_key(&mut fptr, key, s.clone())?
            }
            // Booleans, undefined values, commentary, HIERARCH keys and long
            // strings go in as preformatted cards.
            _ => {
                for card in format_cards(key, value)? {
                    write_record(&mut fptr, &card)?;
                }
            }
        }
    }

    hdu.write_image(&mut fptr, values)?;
    log::debug!(
        "Wrote {} voxels with axes {:?} to '{}'",
        values.len(),
        axis_sizes,
        path.display()
    );
    Ok(())
}

/// Append one 80-character card to the current header.
fn write_record(fptr: &mut FitsFile, card: &str) -> Result<(), WriteError> {
    let card = card.trim_end();
    debug_assert!(card.len() <= CARD_LEN);
    let raw = CString::new(card).map_err(|_| WriteError::Record {
        card: card.to_string(),
        status: -1,
    })?;
    let mut status = 0;
    // SAFETY: `fptr` is an open file and `raw` is a NUL-terminated card that
    // outlives the call.
    unsafe {
        fitsio::sys::ffprec(fptr.as_raw(), raw.as_ptr(), &mut status);
    }
    if status != 0 {
        return Err(WriteError::Record {
            card: card.to_string(),
            status,
        });
    }
    Ok(())
}

fn is_axis_key(key: &str) -> bool {
    key.strip_prefix("NAXIS")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
