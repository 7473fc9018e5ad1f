use std::path::Path;
use std::thread;

use serde::{Deserialize, Serialize};

use super::task::TaskHandle;
use super::{Engine, EngineCall, EngineOutcome};
use crate::data::model::Header;
use crate::data::samples::Samples;
use crate::error::EngineInvocationError;

/// Name of the worker thread used by [`Execution::Worker`].
pub const WORKER_NAME: &str = "engine";

/// Where the engine call runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// On the calling thread.
    #[default]
    Inline,
    /// On one dedicated thread; the caller blocks until it finishes.
    Worker,
}

/// Invoker settings, passed explicitly rather than read from process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Emit info-level records immediately around the engine call.
    pub checkpoints: bool,
    /// Reorder sample bytes to the platform's native order before the call.
    pub normalize_byte_order: bool,
    pub execution: Execution,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            checkpoints: true,
            normalize_byte_order: true,
            execution: Execution::Inline,
        }
    }
}

/// Wraps the engine's single call.
pub struct EngineInvoker<E> {
    engine: E,
    config: InvokerConfig,
}

impl<E: Engine> EngineInvoker<E> {
    pub fn new(engine: E, config: InvokerConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Call the engine exactly once and return its outcome unchanged.
    ///
    /// `header` is dropped when the engine's entry point does not take one.
    /// Errors raised by the engine are propagated, never retried.
    pub fn invoke(
        &self,
        samples: Samples,
        parameter_file: &Path,
        header: Option<&Header>,
    ) -> Result<EngineOutcome, EngineInvocationError> {
        let samples = if self.config.normalize_byte_order {
            samples.normalized()
        } else {
            samples
        };
        let call = EngineCall {
            parameter_file,
            header: header.filter(|_| self.engine.accepts_header()),
            samples: &samples,
        };

        match self.config.execution {
            Execution::Inline => self.call(call),
            Execution::Worker => thread::scope(|scope| {
                let task = TaskHandle::submit(scope, WORKER_NAME, || self.call(call))
                    .map_err(EngineInvocationError::WorkerSpawn)?;
                task.wait()
                    .map_err(|panic| EngineInvocationError::WorkerPanicked(panic.message))?
            }),
        }
    }

    fn call(&self, call: EngineCall<'_>) -> Result<EngineOutcome, EngineInvocationError> {
        if self.config.checkpoints {
            log::info!(
                "engine invocation starting: {} samples ({:?}-endian), parameter file '{}'",
                call.samples.len(),
                call.samples.order(),
                call.parameter_file.display()
            );
        }
        let result = self.engine.mainline(call);
        if self.config.checkpoints {
            match &result {
                Ok(outcome) => log::info!(
                    "engine invocation finished: status {}, parameter file '{}'",
                    outcome.status(),
                    call.parameter_file.display()
                ),
                Err(err) => log::info!(
                    "engine invocation finished with error: {err}, parameter file '{}'",
                    call.parameter_file.display()
                ),
            }
        }
        Ok(result?)
    }
}
