//! Harness that loads a FITS data cube and hands its flattened samples to an
//! external source-finding engine.

pub mod data;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use data::loader::{load_cube, read_cube};
pub use data::model::{Header, HeaderValue, VoxelCube};
pub use data::samples::{ByteOrder, Samples};
pub use engine::{Engine, EngineCall, EngineError, EngineInvoker, EngineOutcome, Execution, InvokerConfig};
pub use error::{EngineInvocationError, Error, LoadError};
