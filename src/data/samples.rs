use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ByteOrder
// ---------------------------------------------------------------------------

/// In-memory byte order of multi-byte sample words.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order of the executing platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn is_native(self) -> bool {
        self == Self::native()
    }

    fn flipped(self) -> Self {
        match self {
            ByteOrder::Big => ByteOrder::Little,
            ByteOrder::Little => ByteOrder::Big,
        }
    }
}

// ---------------------------------------------------------------------------
// Samples – the flattened, contiguous sample sequence
// ---------------------------------------------------------------------------

/// Flattened `f32` samples whose in-memory bytes follow `order`.
///
/// The words are owned; nothing borrows from the file they were read from.
/// Only a native-order buffer reads back as the logical values through
/// [`Samples::as_raw`]; [`Samples::values`] always decodes correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Samples {
    words: Vec<u32>,
    order: ByteOrder,
}

impl Samples {
    /// Lay out `values` in `order`.
    pub fn from_values(values: &[f32], order: ByteOrder) -> Self {
        let words = values
            .iter()
            .map(|v| match order {
                ByteOrder::Big => v.to_bits().to_be(),
                ByteOrder::Little => v.to_bits().to_le(),
            })
            .collect();
        Self { words, order }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Logical sample values, independent of the in-memory layout.
    pub fn values(&self) -> Vec<f32> {
        self.words
            .iter()
            .map(|&w| match self.order {
                ByteOrder::Big => f32::from_bits(u32::from_be(w)),
                ByteOrder::Little => f32::from_bits(u32::from_le(w)),
            })
            .collect()
    }

    /// The buffer as raw bytes, in `order`.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// The buffer reinterpreted as platform floats, exactly as handed to the engine.
    pub fn as_raw(&self) -> &[f32] {
        bytemuck::cast_slice(&self.words)
    }

    /// The same values in the platform's native byte order.
    pub fn normalized(self) -> Self {
        if self.order.is_native() {
            self
        } else {
            self.swapped()
        }
    }

    /// Swap the bytes of every word and flip the order tag; values are unchanged.
    pub fn swapped(self) -> Self {
        Self {
            words: self.words.into_iter().map(u32::swap_bytes).collect(),
            order: self.order.flipped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [f32; 4] = [1.0, -2.5, 3.25e-3, f32::MAX];

    #[test]
    fn big_endian_bytes_match_disk_layout() {
        let samples = Samples::from_values(&[1.0], ByteOrder::Big);
        assert_eq!(samples.as_bytes(), &[0x3f, 0x80, 0x00, 0x00]);

        let samples = Samples::from_values(&[1.0], ByteOrder::Little);
        assert_eq!(samples.as_bytes(), &[0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn normalize_is_idempotent() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let once = Samples::from_values(&VALUES, order).normalized();
            let twice = once.clone().normalized();
            assert_eq!(once.as_bytes(), twice.as_bytes());
            assert_eq!(once.order(), ByteOrder::native());
            assert_eq!(once.as_raw(), &VALUES);
        }
    }

    #[test]
    fn swap_is_its_own_inverse() {
        let original = Samples::from_values(&VALUES, ByteOrder::Big);
        let bytes = original.as_bytes().to_vec();

        let swapped = original.swapped();
        assert_ne!(swapped.as_bytes(), bytes.as_slice());
        assert_eq!(swapped.values(), VALUES);

        let restored = swapped.swapped();
        assert_eq!(restored.as_bytes(), bytes.as_slice());
        assert_eq!(restored.order(), ByteOrder::Big);
    }

    #[test]
    fn foreign_order_reads_wrong_until_normalized() {
        let foreign = match ByteOrder::native() {
            ByteOrder::Big => ByteOrder::Little,
            ByteOrder::Little => ByteOrder::Big,
        };
        let samples = Samples::from_values(&[1.0, 2.0], foreign);
        assert_ne!(samples.as_raw(), &[1.0, 2.0]);
        assert_eq!(samples.values(), vec![1.0, 2.0]);
        assert_eq!(samples.normalized().as_raw(), &[1.0, 2.0]);
    }

    #[test]
    fn empty_buffer() {
        let samples = Samples::from_values(&[], ByteOrder::Big);
        assert!(samples.is_empty());
        assert!(samples.normalized().as_raw().is_empty());
    }
}
