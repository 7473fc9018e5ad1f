/// Data layer: FITS parsing, the cube model and the flattened samples.
///
/// Architecture:
/// ```text
///   cube.fits
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  header cards → Header, data block → VoxelCube
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   samples     │  row-major flatten, big-endian words
///   └──────────────┘
///        │
///        ▼
///     engine
/// ```
///
/// `writer` produces the same format for the sample generator and tests.

pub mod header;
pub mod loader;
pub mod model;
pub mod samples;
pub mod writer;
