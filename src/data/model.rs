use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, IxDyn, ShapeError};
use serde::ser::{Serialize, SerializeMap, Serializer};

// ---------------------------------------------------------------------------
// HeaderValue – the value half of a header card
// ---------------------------------------------------------------------------

/// A dynamically-typed header value mirroring the FITS card value types.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Card with a value indicator but no value (undefined).
    Null,
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => write!(f, "'{s}'"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            HeaderValue::Null => write!(f, "<undefined>"),
        }
    }
}

impl HeaderValue {
    /// Integer view; floats are accepted only when they hold a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            HeaderValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Header – ordered key → value mapping of the primary header
// ---------------------------------------------------------------------------

/// Header keys in on-disk order. Keys are unique; the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    entries: Vec<(String, HeaderValue)>,
    /// key → position in `entries`
    index: BTreeMap<String, usize>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` unless it is already present.
    ///
    /// Returns `false` (and leaves the header untouched) for a repeated key.
    pub fn insert(&mut self, key: impl Into<String>, value: HeaderValue) -> bool {
        let key = key.into();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        true
    }

    /// Append a line of commentary text to `key`, creating the entry on first use.
    ///
    /// Returns `false` (and drops the line) when `key` already holds a
    /// non-text value.
    pub fn append_text(&mut self, key: &str, line: &str) -> bool {
        match self.index.get(key) {
            Some(&pos) => match &mut self.entries[pos].1 {
                HeaderValue::Text(existing) => {
                    existing.push('\n');
                    existing.push_str(line);
                    true
                }
                _ => false,
            },
            None => self.insert(key, HeaderValue::Text(line.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Entries in insertion (on-disk) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the header is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Header {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// VoxelCube – the primary data array
// ---------------------------------------------------------------------------

/// The primary data array, shaped slowest axis first: `(NAXISn, …, NAXIS1)`.
///
/// FITS stores `NAXIS1` as the fastest-varying axis, so a row-major walk of
/// this array visits voxels in on-disk order.
#[derive(Debug, Clone)]
pub struct VoxelCube {
    data: ArrayD<f32>,
}

impl VoxelCube {
    /// Build a cube from values in on-disk order and `NAXIS1..NAXISn` sizes.
    pub fn from_disk_order(axis_sizes: &[usize], values: Vec<f32>) -> Result<Self, ShapeError> {
        let shape: Vec<usize> = axis_sizes.iter().rev().copied().collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        Ok(Self { data })
    }

    /// Axis sizes in FITS order (`NAXIS1` first).
    pub fn axis_sizes(&self) -> Vec<usize> {
        self.data.shape().iter().rev().copied().collect()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of voxels (product of the axis sizes).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Voxel at a FITS-ordered, zero-based index `(x, y, z, …)`.
    pub fn value_at(&self, fits_index: &[usize]) -> Option<f32> {
        let index: Vec<usize> = fits_index.iter().rev().copied().collect();
        self.data.get(IxDyn(&index)).copied()
    }

    /// Row-major (C order) flattening: `NAXIS1` varies fastest.
    pub fn flatten(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}
