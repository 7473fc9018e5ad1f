//! Submit-and-join background task.
//!
//! A task runs on its own named thread inside a [`std::thread::scope`], so it
//! may borrow from the caller. The caller gets a [`TaskHandle`] back and
//! blocks in [`TaskHandle::wait`] until the body returns.

use std::any::Any;
use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};

use thiserror::Error;

/// The task body panicked instead of returning.
#[derive(Error, Debug)]
#[error("task '{name}' panicked: {message}")]
pub struct TaskPanic {
    pub name: String,
    pub message: String,
}

pub struct TaskHandle<'scope, T> {
    name: String,
    handle: ScopedJoinHandle<'scope, T>,
}

impl<'scope, T: Send + 'scope> TaskHandle<'scope, T> {
    /// Start `body` on a new thread named `name`.
    pub fn submit<'env, F>(
        scope: &'scope Scope<'scope, 'env>,
        name: &str,
        body: F,
    ) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'scope,
    {
        // Nothing may be logged from here once the task runs.
        log::debug!("Submitting task '{name}'");
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn_scoped(scope, body)?;
        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the task completes and hand back its result.
    pub fn wait(self) -> Result<T, TaskPanic> {
        let result = self.handle.join().map_err(|payload| TaskPanic {
            message: panic_message(payload.as_ref()),
            name: self.name.clone(),
        });
        log::debug!("Joined task '{}'", self.name);
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
