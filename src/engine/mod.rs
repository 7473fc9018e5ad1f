//! Boundary to the external source-finding engine.
//!
//! The engine is an opaque component with a single entry point. This module
//! describes that capability ([`Engine`]), binds it to a shared library
//! ([`native`]), and wraps the one call the harness makes ([`invoker`]).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::data::header::CardError;
use crate::data::model::Header;
use crate::data::samples::Samples;

pub mod invoker;
pub mod native;
pub mod task;

pub use invoker::{EngineInvoker, Execution, InvokerConfig};
pub use native::NativeEngine;

/// Opaque status returned by the engine. Never interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineOutcome(i32);

impl EngineOutcome {
    pub fn new(status: i32) -> Self {
        Self(status)
    }

    pub fn status(self) -> i32 {
        self.0
    }
}

/// Arguments of one engine call.
#[derive(Debug, Clone, Copy)]
pub struct EngineCall<'a> {
    /// Engine parameter file; forwarded verbatim, never opened here.
    pub parameter_file: &'a Path,
    /// Primary header, present only when the engine accepts one.
    pub header: Option<&'a Header>,
    pub samples: &'a Samples,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load engine library '{}': {source}", .path.display())]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("engine library '{}' has no '{symbol}' entry point: {source}", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("{0} contains an interior NUL byte and cannot be passed to the engine")]
    InvalidArgument(String),

    #[error("header cannot be encoded for the engine: {0}")]
    Header(#[from] CardError),

    /// Failure reported by the engine itself.
    #[error("{0}")]
    Failed(String),
}

/// A single-entry-point numeric engine.
pub trait Engine: Send + Sync {
    /// Whether the entry point takes the primary header.
    fn accepts_header(&self) -> bool {
        false
    }

    /// The engine's one entry point. Blocking.
    fn mainline(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineError>;
}

impl<E: Engine + ?Sized> Engine for &E {
    fn accepts_header(&self) -> bool {
        (**self).accepts_header()
    }

    fn mainline(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineError> {
        (**self).mainline(call)
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn accepts_header(&self) -> bool {
        (**self).accepts_header()
    }

    fn mainline(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineError> {
        (**self).mainline(call)
    }
}
