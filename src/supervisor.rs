//! A single supervised run on its own thread, stoppable from the caller.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared stop flag, checked by the frame loop between iterations.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RunHandle<T> {
    name: String,
    token: CancelToken,
    join: Option<JoinHandle<Result<T>>>,
}

impl<T> RunHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    fn join(&mut self) -> Result<Option<T>> {
        let Some(join) = self.join.take() else {
            return Ok(None);
        };
        let outcome = join
            .join()
            .map_err(|_| anyhow!("run '{}' panicked", self.name))?;
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                log::error!("run '{}' failed: {:#}", self.name, err);
                Err(err)
            }
        }
    }
}

/// Owns at most one active run. Starting a new one stops the previous run.
#[derive(Debug)]
pub struct RunSupervisor<T> {
    active: Option<RunHandle<T>>,
}

impl<T> Default for RunSupervisor<T> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<T: Send + 'static> RunSupervisor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `run` on a thread named `name` with a fresh token.
    ///
    /// Returns the new token. The previous run's result is logged and dropped.
    pub fn start<F>(&mut self, name: &str, run: F) -> Result<CancelToken>
    where
        F: FnOnce(CancelToken) -> Result<T> + Send + 'static,
    {
        if self.active.is_some() {
            if let Err(err) = self.stop() {
                log::warn!("previous run ended with error: {:#}", err);
            }
        }

        let token = CancelToken::new();
        let thread_token = token.clone();
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(thread_token))
            .with_context(|| format!("failed to spawn run '{}'", name))?;
        log::info!("started run '{}'", name);
        self.active = Some(RunHandle {
            name: name.to_string(),
            token: token.clone(),
            join: Some(join),
        });
        Ok(token)
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Cancel and join the active run. `Ok(None)` when nothing was running.
    pub fn stop(&mut self) -> Result<Option<T>> {
        let Some(mut handle) = self.active.take() else {
            return Ok(None);
        };
        handle.token.cancel();
        let outcome = handle.join();
        log::info!("stopped run '{}'", handle.name);
        outcome
    }

    /// Join the active run without cancelling it.
    pub fn wait(&mut self) -> Result<Option<T>> {
        match self.active.take() {
            Some(mut handle) => handle.join(),
            None => Ok(None),
        }
    }
}

impl<T> Drop for RunSupervisor<T> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.active.take() {
            handle.token.cancel();
            let _ = handle.join();
        }
    }
}
