//! Progress reporting and cooperative cancellation

use crate::error::{ExcelError, Result};
use crate::types::ProgressEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that asks a running task to stop at its next checkpoint
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(ExcelError::Canceled)` once the token has fired
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(ExcelError::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Percent for `done` of `total` steps.
///
/// Rounds up, but stays below 100 until the last step so that 100 always
/// means "finished".
pub fn step_percent(done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    let percent = (done * 100).div_ceil(total);
    percent.min(99) as u8
}

/// Single delivery path for one task's progress events.
///
/// Percents handed out are clamped to be non-decreasing.
pub struct ProgressReporter<'a> {
    emit: Box<dyn FnMut(ProgressEvent) + 'a>,
    cancel: CancelToken,
    last: Option<u8>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new<F>(emit: F) -> Self
    where
        F: FnMut(ProgressEvent) + 'a,
    {
        ProgressReporter {
            emit: Box::new(emit),
            cancel: CancelToken::new(),
            last: None,
        }
    }

    /// Reporter that drops every event
    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    /// Observe `cancel` at every checkpoint
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fail with `Canceled` if the task was asked to stop
    pub fn checkpoint(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Highest percent reported so far
    pub fn last_percent(&self) -> Option<u8> {
        self.last
    }

    /// Report `done` of `total` steps; `label` names the step just finished
    pub fn step(&mut self, verb: &str, done: usize, total: usize, label: &str) {
        let percent = step_percent(done, total);
        self.report(percent, format!("{}... {}% ({})", verb, percent, label));
    }

    /// Report a raw percent, clamped to the last one handed out
    pub fn report(&mut self, percent: u8, status: impl Into<String>) {
        let percent = percent.min(100).max(self.last.unwrap_or(0));
        self.last = Some(percent);
        (self.emit)(ProgressEvent::new(percent, status));
    }

    /// Close out a successful task: emits 100 unless it was already reached
    pub fn finish(&mut self, status: impl Into<String>) {
        if self.last != Some(100) {
            self.report(100, status);
        }
    }
}
