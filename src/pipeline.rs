//! Straight-line run: load the cube, then call the engine once.

use std::path::Path;

use crate::data::loader::load_cube;
use crate::engine::{Engine, EngineError, EngineInvoker, EngineOutcome, InvokerConfig};
use crate::error::{EngineInvocationError, Error};

/// Load `cube_path` and hand the samples to the engine produced by `connect`.
///
/// `connect` runs only after the cube has loaded, so a bad input file never
/// touches the engine.
pub fn run<E, F>(
    cube_path: &Path,
    parameter_file: &Path,
    config: InvokerConfig,
    connect: F,
) -> Result<EngineOutcome, Error>
where
    E: Engine,
    F: FnOnce() -> Result<E, EngineError>,
{
    let (header, samples) = load_cube(cube_path)?;
    if log::log_enabled!(log::Level::Debug) {
        match serde_json::to_string(&header) {
            Ok(json) => log::debug!("Primary header: {json}"),
            Err(e) => log::debug!("Primary header not serialisable: {e}"),
        }
    }

    let engine = connect().map_err(EngineInvocationError::from)?;
    let invoker = EngineInvoker::new(engine, config);
    Ok(invoker.invoke(samples, parameter_file, Some(&header))?)
}
