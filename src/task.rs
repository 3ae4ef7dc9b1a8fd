//! Background Task Runner
//!
//! Analysis and split jobs run on a dedicated worker thread. Everything the
//! worker produces travels back over one channel per task: zero or more
//! [`TaskEvent::Progress`] followed by exactly one [`TaskEvent::Finished`].
//! The caller drains that channel from whatever thread it owns (typically a
//! UI event loop), so nothing is ever invoked on the caller's behalf from the
//! worker thread.
//!
//! The runner does not serialise tasks touching the same file. Callers keep at
//! most one task per source file in flight.

use crate::analysis::analyze;
use crate::config::EngineConfig;
use crate::error::{ExcelError, Result};
use crate::progress::{CancelToken, ProgressReporter};
use crate::reader::ExcelReader;
use crate::split::{SplitEngine, SplitRequest, SplitSummary};
use crate::types::{ProgressEvent, WorkbookAnalysis};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Message from a worker to its caller
#[derive(Debug)]
pub enum TaskEvent<T> {
    Progress(ProgressEvent),
    Finished(Result<T>),
}

/// Caller-side end of a running task
pub struct TaskHandle<T> {
    events: Receiver<TaskEvent<T>>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl<T> TaskHandle<T> {
    /// Ask the worker to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Raw event channel, for callers that multiplex several sources
    pub fn events(&self) -> &Receiver<TaskEvent<T>> {
        &self.events
    }

    /// Non-blocking poll, e.g. once per UI frame
    pub fn try_next(&mut self) -> Option<TaskEvent<T>> {
        match self.events.try_recv() {
            Ok(TaskEvent::Finished(result)) => {
                self.join();
                Some(TaskEvent::Finished(result))
            }
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self
                .join()
                .then(|| TaskEvent::Finished(Err(worker_lost()))),
        }
    }

    /// Block until the task ends, discarding progress
    pub fn wait(self) -> Result<T> {
        self.wait_with(|_| {})
    }

    /// Block until the task ends, handing each progress event to `on_progress`
    pub fn wait_with<F>(mut self, mut on_progress: F) -> Result<T>
    where
        F: FnMut(&ProgressEvent),
    {
        while let Ok(event) = self.events.recv() {
            match event {
                TaskEvent::Progress(progress) => on_progress(&progress),
                TaskEvent::Finished(result) => {
                    self.join();
                    return result;
                }
            }
        }

        self.join();
        Err(worker_lost())
    }

    // true if a worker was still attached
    fn join(&mut self) -> bool {
        match self.worker.take() {
            Some(worker) => {
                let _ = worker.join();
                true
            }
            None => false,
        }
    }
}

// The channel closed without a terminal event
fn worker_lost() -> ExcelError {
    ExcelError::TaskPanicked("worker exited without a result".to_string())
}

/// Run `job` on a new worker thread named `name`
pub fn spawn_task<T, F>(name: &str, job: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&mut ProgressReporter) -> Result<T> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let cancel = CancelToken::new();

    let worker_tx = tx.clone();
    let worker_cancel = cancel.clone();
    let task_name = name.to_string();

    let spawned = thread::Builder::new()
        .name(format!("excelsplit-{}", name))
        .spawn(move || run_worker(&task_name, job, worker_tx, worker_cancel));

    let worker = match spawned {
        Ok(worker) => Some(worker),
        Err(e) => {
            warn!(task = name, error = %e, "failed to start worker thread");
            let _ = tx.send(TaskEvent::Finished(Err(ExcelError::IoError(e))));
            None
        }
    };

    TaskHandle {
        events: rx,
        cancel,
        worker,
    }
}

fn run_worker<T, F>(name: &str, job: F, tx: Sender<TaskEvent<T>>, cancel: CancelToken)
where
    F: FnOnce(&mut ProgressReporter) -> Result<T>,
{
    let progress_tx = tx.clone();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut reporter = ProgressReporter::new(|event| {
            let _ = progress_tx.send(TaskEvent::Progress(event));
        })
        .with_cancel(cancel);

        let result = job(&mut reporter);
        if result.is_ok() {
            reporter.finish("Completed");
        }
        result
    }));

    let result = outcome
        .unwrap_or_else(|panic| Err(ExcelError::TaskPanicked(panic_message(&*panic))));
    match &result {
        Ok(_) => info!(task = name, "task finished"),
        Err(e) => warn!(task = name, error = %e, "task failed"),
    }

    let _ = tx.send(TaskEvent::Finished(result));
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Analyse the workbook at `path` in the background
pub fn spawn_analysis(path: impl Into<PathBuf>) -> TaskHandle<WorkbookAnalysis> {
    let path = path.into();
    spawn_task("analysis", move |progress| {
        let mut reader = ExcelReader::open(&path)?;
        analyze(&mut reader, progress)
    })
}

/// Split the workbook at `path` in the background
///
/// `analysis` must come from the same file.
pub fn spawn_split(
    path: impl Into<PathBuf>,
    analysis: Arc<WorkbookAnalysis>,
    request: SplitRequest,
    output_dir: impl Into<PathBuf>,
    config: EngineConfig,
) -> TaskHandle<SplitSummary> {
    let path = path.into();
    let output_dir = output_dir.into();
    spawn_task("split", move |progress| {
        let mut reader = ExcelReader::open(&path)?;
        SplitEngine::new(&analysis, output_dir)
            .with_config(config)
            .run(&mut reader, &request, progress)
    })
}
