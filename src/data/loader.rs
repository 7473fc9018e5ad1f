use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use fitsio::hdu::HduInfo;
use fitsio::FitsFile;

use super::header::{parse_card, Card, BLOCK_LEN, CARD_LEN};
use super::model::{Header, HeaderValue, VoxelCube};
use super::samples::{ByteOrder, Samples};
use crate::error::LoadError;

/// FITS stores every multi-byte value big-endian.
pub const SOURCE_ORDER: ByteOrder = ByteOrder::Big;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the primary HDU of a FITS cube.
///
/// Returns the primary header in on-disk order and the voxels flattened
/// row-major over `(NAXISn, …, NAXIS1)`, i.e. with `NAXIS1` varying fastest.
/// The samples are an owned copy laid out in [`SOURCE_ORDER`]; the file is
/// closed before this returns.
pub fn load_cube(path: &Path) -> Result<(Header, Samples), LoadError> {
    let (header, cube) = read_cube(path)?;
    let samples = Samples::from_values(&cube.flatten(), SOURCE_ORDER);
    log::info!("Loaded {} samples from '{}'", samples.len(), path.display());
    Ok((header, samples))
}

/// Read the primary header and data array without flattening.
///
/// The header is walked card by card to keep on-disk order; the pixels are
/// read through cfitsio once the declared data block is known to fit in the
/// file.
pub fn read_cube(path: &Path) -> Result<(Header, VoxelCube), LoadError> {
    log::info!("Opening FITS file '{}'", path.display());
    let (file, file_len) = open(path)?;
    let (header, header_len) = read_header(&mut BufReader::new(file), path)?;

    let layout = DataLayout::from_header(&header).map_err(|reason| LoadError::format(path, reason))?;
    let byte_len = layout
        .byte_len()
        .ok_or_else(|| LoadError::format(path, "data size overflows the address space"))?;

    log::debug!("Reading FITS data with the following specifications:");
    log::debug!("  Data type:    {}", layout.bitpix);
    log::debug!("  No. of axes:  {}", layout.axis_sizes.len());
    log::debug!("  Axis sizes:   {:?}", layout.axis_sizes);
    log::debug!("  Memory used:  {:.1} MB", byte_len as f64 / 1_048_576.0);

    // Nothing is allocated for the data until the file is known to hold it.
    let available = file_len.saturating_sub(header_len);
    if u64::try_from(byte_len).map_or(true, |len| len > available) {
        return Err(LoadError::format(
            path,
            format!("data block truncated; header declares {byte_len} bytes but {available} follow"),
        ));
    }

    let values = read_pixels(path, &layout)?;
    let cube = VoxelCube::from_disk_order(&layout.axis_sizes, values)
        .map_err(|e| LoadError::format(path, e.to_string()))?;
    Ok((header, cube))
}

// ---------------------------------------------------------------------------
// File access
// ---------------------------------------------------------------------------

/// Open a regular file, returning it with its length.
fn open(path: &Path) -> Result<(File, u64), LoadError> {
    let not_found = |source: io::Error| LoadError::NotFound {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(not_found)?;
    if !metadata.is_file() {
        return Err(not_found(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let file = File::open(path).map_err(not_found)?;
    Ok((file, metadata.len()))
}

/// `read_exact`, reporting an early EOF as a format problem and anything else
/// as an unreadable file.
fn read_exact_or<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    path: &Path,
    truncated: impl FnOnce() -> String,
) -> Result<(), LoadError> {
    reader.read_exact(buf).map_err(|source| {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            LoadError::format(path, truncated())
        } else {
            LoadError::NotFound {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Walk the header blocks up to `END`; returns the header and its padded length.
fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<(Header, u64), LoadError> {
    let mut builder = HeaderBuilder::default();
    let mut block = [0u8; BLOCK_LEN];
    let mut card_no = 0usize;
    let mut header_len = 0u64;

    loop {
        read_exact_or(reader, &mut block, path, || {
            "header ended before the END card".to_string()
        })?;
        header_len += BLOCK_LEN as u64;

        for raw in block.chunks_exact(CARD_LEN) {
            if card_no == 0 && !raw.starts_with(b"SIMPLE  ") {
                return Err(LoadError::format(
                    path,
                    "missing 'SIMPLE' keyword; file does not appear to be a FITS file",
                ));
            }
            card_no += 1;

            match parse_card(raw) {
                Ok(Card::End) => return Ok((builder.finish(), header_len)),
                Ok(card) => builder.push(card),
                Err(e) => {
                    return Err(LoadError::format(path, format!("header card {card_no}: {e}")));
                }
            }
        }
    }
}

/// Folds cards into a [`Header`]: joins `CONTINUE` pieces, accumulates
/// commentary, and keeps the first of any repeated key.
#[derive(Default)]
struct HeaderBuilder {
    header: Header,
    /// Long string still expecting `CONTINUE` cards.
    pending: Option<(String, String)>,
}

impl HeaderBuilder {
    fn push(&mut self, card: Card) {
        if let Card::Continue(piece) = &card {
            if let Some((_, text)) = self.pending.as_mut() {
                text.pop(); // the '&'
                text.push_str(piece);
                if !piece.ends_with('&') {
                    self.flush();
                }
                return;
            }
        }

        self.flush();
        match card {
            Card::Value {
                key,
                value: HeaderValue::Text(s),
            } if s.ends_with('&') => self.pending = Some((key, s)),
            Card::Value { key, value } => self.insert(key, value),
            Card::Commentary { key, text } => self.append(&key, &text),
            Card::Continue(piece) => self.append("CONTINUE", &piece),
            Card::End => {}
        }
    }

    fn flush(&mut self) {
        if let Some((key, text)) = self.pending.take() {
            self.insert(key, HeaderValue::Text(text));
        }
    }

    fn insert(&mut self, key: String, value: HeaderValue) {
        if !self.header.insert(key.clone(), value.clone()) {
            log::warn!("Repeated header keyword '{key}' = {value} ignored; keeping the first value");
        }
    }

    fn append(&mut self, key: &str, text: &str) {
        if !self.header.append_text(key, text) {
            log::warn!("Commentary '{key} {text}' dropped; '{key}' already holds a value card");
        }
    }

    fn finish(mut self) -> Header {
        self.flush();
        self.header
    }
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

/// What the mandatory keywords say about the data block.
#[derive(Debug)]
struct DataLayout {
    bitpix: i64,
    /// `NAXIS1..NAXISn`
    axis_sizes: Vec<usize>,
    bscale: f64,
    bzero: f64,
    /// Integer value marking undefined pixels.
    blank: Option<i64>,
}

impl DataLayout {
    fn from_header(header: &Header) -> Result<Self, String> {
        let bitpix = required_int(header, "BITPIX")?;
        if ![8, 16, 32, 64, -32, -64].contains(&bitpix) {
            return Err(format!("invalid BITPIX {bitpix}"));
        }

        let naxis = required_int(header, "NAXIS")?;
        if naxis == 0 {
            return Err("primary HDU holds no data (NAXIS = 0)".to_string());
        }
        if !(1..=999).contains(&naxis) {
            return Err(format!("invalid NAXIS {naxis}"));
        }

        let mut axis_sizes = Vec::with_capacity(naxis as usize);
        for n in 1..=naxis {
            let key = format!("NAXIS{n}");
            let size = required_int(header, &key)?;
            if size < 1 {
                return Err(format!("{key} = {size}; axis sizes must be positive"));
            }
            let size = usize::try_from(size).map_err(|_| format!("{key} = {size} is too large"))?;
            axis_sizes.push(size);
        }

        Ok(Self {
            bitpix,
            axis_sizes,
            bscale: optional_float(header, "BSCALE", 1.0)?,
            bzero: optional_float(header, "BZERO", 0.0)?,
            blank: if bitpix > 0 {
                header.get("BLANK").and_then(HeaderValue::as_i64)
            } else {
                None
            },
        })
    }

    fn word_size(&self) -> usize {
        (self.bitpix.unsigned_abs() / 8) as usize
    }

    fn byte_len(&self) -> Option<usize> {
        self.axis_sizes
            .iter()
            .try_fold(self.word_size(), |acc, &n| acc.checked_mul(n))
    }

    fn len(&self) -> usize {
        self.axis_sizes.iter().product()
    }

    /// What cfitsio returns for a `BLANK` pixel once scaling is applied.
    fn scaled_blank(&self) -> Option<f32> {
        self.blank
            .map(|raw| (self.bzero + self.bscale * raw as f64) as f32)
    }
}

/// Read the primary image through cfitsio, which applies `BSCALE` / `BZERO`.
/// Blank pixels come back scaled and are replaced with NaN here.
fn read_pixels(path: &Path, layout: &DataLayout) -> Result<Vec<f32>, LoadError> {
    let fits_error = |e: fitsio::errors::Error| LoadError::format(path, format!("cfitsio: {e}"));

    let mut fptr = FitsFile::open(path).map_err(fits_error)?;
    let hdu = fptr.primary_hdu().map_err(fits_error)?;
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.iter().product::<usize>() == layout.len() => {}
        HduInfo::ImageInfo { shape, .. } => {
            return Err(LoadError::format(
                path,
                format!("cfitsio sees image shape {shape:?}, header declares {:?}", layout.axis_sizes),
            ));
        }
        _ => return Err(LoadError::format(path, "primary HDU is not an image")),
    }

    let mut values: Vec<f32> = hdu.read_image(&mut fptr).map_err(fits_error)?;
    if let Some(blank) = layout.scaled_blank() {
        values.iter_mut().filter(|v| **v == blank).for_each(|v| *v = f32::NAN);
    }
    Ok(values)
}

fn required_int(header: &Header, key: &str) -> Result<i64, String> {
    match header.get(key) {
        None => Err(format!("missing mandatory keyword {key}")),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| format!("keyword {key} = {value} is not an integer")),
    }
}

fn optional_float(header: &Header, key: &str, default: f64) -> Result<f64, String> {
    match header.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("keyword {key} = {value} is not a finite number")),
    }
}
