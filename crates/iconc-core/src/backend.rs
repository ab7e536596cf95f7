//! Execution backends
//!
//! The same task state machine runs either:
//! - **isolated**: on a dedicated worker thread with its own runtime,
//!   reporting stages over a channel; a crash stays inside the worker
//! - **in-process**: on the caller's runtime, reporting to the sink directly
//!
//! Both produce identical result payloads. Timeouts are enforced here so a
//! stuck collaborator cannot hold its gate slot forever, and a collaborator
//! panic fails only its own task on either backend.

use crate::error::{CompilationError, ErrorKind};
use crate::progress::ProgressSink;
use crate::task::{self, Cancellation, Collaborators, TaskSpec};
use crate::types::{CompilationResult, IconSource, Stage};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Where a compilation task executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionBackend {
    /// Dedicated worker thread per task
    #[default]
    Isolated,
    /// Caller's runtime
    InProcess,
}

/// Messages a worker sends back to the orchestrator
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Worker entered a stage
    Stage(Stage),
    /// Worker finished; carries the final result
    Completed(CompilationResult),
}

impl ExecutionBackend {
    /// Run one task on this backend
    ///
    /// Never fails: worker crashes and timeouts become failed results.
    pub async fn execute(
        self,
        spec: TaskSpec,
        collaborators: Collaborators,
        sink: Arc<dyn ProgressSink>,
        timeout: Option<Duration>,
    ) -> CompilationResult {
        match self {
            Self::Isolated => execute_isolated(spec, collaborators, sink, timeout).await,
            Self::InProcess => execute_in_process(spec, collaborators, sink, timeout).await,
        }
    }
}

async fn execute_in_process(
    spec: TaskSpec,
    collaborators: Collaborators,
    sink: Arc<dyn ProgressSink>,
    timeout: Option<Duration>,
) -> CompilationResult {
    let start = Instant::now();
    let recorder = StageRecorder::new(Arc::clone(&sink));
    let cancel = Cancellation::new();

    let running = AssertUnwindSafe(task::run(&spec, &collaborators, &recorder, &cancel)).catch_unwind();
    let finished = match timeout {
        Some(limit) => tokio::time::timeout(limit, running).await.ok(),
        None => Some(running.await),
    };

    let result = match finished {
        Some(Ok(result)) => return result,
        Some(Err(payload)) => panicked(&spec, start.elapsed(), recorder.last(), payload.as_ref()),
        None => {
            cancel.cancel();
            timed_out(&spec, start.elapsed(), recorder.last(), timeout.unwrap_or_default())
        }
    };

    sink.post(&spec.source, Stage::Completed, Some(&result));
    result
}

async fn execute_isolated(
    spec: TaskSpec,
    collaborators: Collaborators,
    sink: Arc<dyn ProgressSink>,
    timeout: Option<Duration>,
) -> CompilationResult {
    let start = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = Cancellation::new();

    let worker_spec = spec.clone();
    let worker_cancel = cancel.clone();
    let spawned = thread::Builder::new()
        .name(format!("compile[{}]", spec.source.key()))
        .spawn(move || worker_main(&worker_spec, &collaborators, &worker_cancel, tx));

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            let error = CompilationError::from_io(ErrorKind::Worker, &spec.source.path, &e);
            let result = CompilationResult::failed(spec.source.clone(), start.elapsed(), Stage::Started, error);
            sink.post(&spec.source, Stage::Completed, Some(&result));
            return result;
        }
    };

    let mut last = Stage::Started;
    let receiving = async {
        while let Some(message) = rx.recv().await {
            match message {
                WorkerMessage::Stage(stage) => {
                    last = stage;
                    sink.post(&spec.source, stage, None);
                }
                WorkerMessage::Completed(result) => return Some(result),
            }
        }
        None
    };

    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, receiving).await,
        None => Ok(receiving.await),
    };

    let result = match received {
        Ok(Some(result)) => {
            sink.post(&spec.source, Stage::Completed, Some(&result));
            return result;
        }
        Ok(None) => {
            // Channel closed without a result: the worker died
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Err(payload)) => panicked(&spec, start.elapsed(), last, payload.as_ref()),
                Ok(Ok(())) => worker_failed(&spec, start.elapsed(), last, "worker exited without reporting completion"),
                Err(e) => worker_failed(&spec, start.elapsed(), last, &format!("failed to join worker: {e}")),
            }
        }
        Err(_) => {
            // The detached worker stops at its next stage boundary; late messages are dropped with the receiver
            cancel.cancel();
            tracing::warn!(path = %spec.source.path.display(), "abandoning timed out worker");
            timed_out(&spec, start.elapsed(), last, timeout.unwrap_or_default())
        }
    };

    sink.post(&spec.source, Stage::Completed, Some(&result));
    result
}

/// Body of an isolated worker thread
fn worker_main(
    spec: &TaskSpec,
    collaborators: &Collaborators,
    cancel: &Cancellation,
    tx: mpsc::UnboundedSender<WorkerMessage>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let error = CompilationError::from_io(ErrorKind::Worker, &spec.source.path, &e);
            let result = CompilationResult::failed(spec.source.clone(), Duration::ZERO, Stage::Started, error);
            let _ = tx.send(WorkerMessage::Completed(result));
            return;
        }
    };

    let sink = ChannelProgress { tx };
    runtime.block_on(task::run(spec, collaborators, &sink, cancel));
}

/// Forwards stage entries from a worker to its parent
struct ChannelProgress {
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl ProgressSink for ChannelProgress {
    fn post(&self, _source: &IconSource, stage: Stage, result: Option<&CompilationResult>) {
        let message = match result {
            Some(result) => WorkerMessage::Completed(result.clone()),
            None => WorkerMessage::Stage(stage),
        };
        // Parent gone means the task was abandoned
        let _ = self.tx.send(message);
    }
}

/// Remembers the last stage while forwarding to another sink
struct StageRecorder {
    inner: Arc<dyn ProgressSink>,
    last: Mutex<Stage>,
}

impl StageRecorder {
    fn new(inner: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner,
            last: Mutex::new(Stage::Started),
        }
    }

    fn last(&self) -> Stage {
        *self.last.lock()
    }
}

impl ProgressSink for StageRecorder {
    fn post(&self, source: &IconSource, stage: Stage, result: Option<&CompilationResult>) {
        if stage != Stage::Completed {
            *self.last.lock() = stage;
        }
        self.inner.post(source, stage, result);
    }
}

fn timed_out(spec: &TaskSpec, elapsed: Duration, failed_at: Stage, limit: Duration) -> CompilationResult {
    let error = CompilationError::new(
        ErrorKind::Timeout,
        format!("compilation timed out after {}s while {failed_at}", limit.as_secs_f64()),
    )
    .with_path(&spec.source.path);
    CompilationResult::failed(spec.source.clone(), elapsed, failed_at, error)
}

fn panicked(spec: &TaskSpec, elapsed: Duration, failed_at: Stage, payload: &(dyn Any + Send)) -> CompilationResult {
    worker_failed(spec, elapsed, failed_at, &format!("worker panicked: {}", panic_message(payload)))
}

fn worker_failed(spec: &TaskSpec, elapsed: Duration, failed_at: Stage, reason: &str) -> CompilationResult {
    let error = CompilationError::new(ErrorKind::Worker, reason).with_path(&spec.source.path);
    CompilationResult::failed(spec.source.clone(), elapsed, failed_at, error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        let isolated: ExecutionBackend = serde_json::from_str(r#""isolated""#).unwrap();
        let in_process: ExecutionBackend = serde_json::from_str(r#""in-process""#).unwrap();
        assert_eq!(isolated, ExecutionBackend::Isolated);
        assert_eq!(in_process, ExecutionBackend::InProcess);
        assert_eq!(ExecutionBackend::default(), ExecutionBackend::Isolated);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(text.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
