//! Runs PDF assembly either on a dedicated worker or on the calling thread.
//!
//! Each job gets a fresh worker; workers are never pooled or reused. The
//! strategy is picked once per job ([`Renderer::select`]) and the job walks
//! through [`JobState`]:
//!
//! ```text
//! worker:  Idle -> Dispatched -> Completed | Failed -> Terminated
//! inline:  Idle -> Completed | Failed
//! ```
//!
//! A worker handle never outlives its job: it is terminated exactly once
//! after the outcome is known, and by the guard's `Drop` if the job future is
//! abandoned midway. There is no retry and no cancellation.

#[cfg(not(target_arch = "wasm32"))]
mod thread;
#[cfg(target_arch = "wasm32")]
mod web;
pub mod worker;

#[cfg(not(target_arch = "wasm32"))]
pub use thread::{ThreadSpawner, ThreadWorker};
#[cfg(target_arch = "wasm32")]
pub use web::{WebWorker, WebWorkerSpawner};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::OffloadMode;
use crate::error::{ExportError, Result};
use crate::types::{WorkerRequest, WorkerResponse};

/// Lifecycle of one export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Dispatched,
    Completed,
    Failed,
    Terminated,
}

impl JobState {
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::{Completed, Dispatched, Failed, Idle, Terminated};
        matches!(
            (self, next),
            (Idle, Dispatched | Completed | Failed)
                | (Dispatched, Completed | Failed)
                | (Completed | Failed, Terminated)
        )
    }
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// One export invocation. Not persisted; dropped when the export resolves.
#[derive(Debug, Clone)]
pub struct ExportJob {
    id: u64,
    filename: String,
    state: JobState,
    history: Vec<JobState>,
}

impl ExportJob {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            filename: filename.into(),
            state: JobState::Idle,
            history: vec![JobState::Idle],
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state the job has been in, starting with `Idle`.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!(job = self.id, from = ?self.state, to = ?next, "unexpected job transition");
        }
        debug!(job = self.id, from = ?self.state, to = ?next, "job transition");
        self.state = next;
        self.history.push(next);
    }
}

/// Something a worker sent back over its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A well-formed response message.
    Message(WorkerResponse),
    /// A message arrived but did not have the response shape.
    Malformed(String),
    /// The channel itself failed.
    Error(String),
}

/// A running worker.
pub trait WorkerHandle {
    fn post(&mut self, request: &WorkerRequest) -> Result<()>;

    /// Resolve with the next event. Pending forever if the worker never answers.
    fn next_event(&mut self) -> impl Future<Output = WorkerEvent>;

    fn terminate(&mut self);
}

/// Starts workers, one per job.
pub trait WorkerSpawner {
    type Handle: WorkerHandle;

    /// Whether this runtime can start a worker at all.
    fn is_available(&self) -> bool;

    fn spawn(&self) -> Result<Self::Handle>;
}

/// Spawner for runtimes without worker support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWorkers;

/// Uninhabited handle type of [`NoWorkers`].
#[derive(Debug)]
pub enum NoWorker {}

impl WorkerHandle for NoWorker {
    fn post(&mut self, _request: &WorkerRequest) -> Result<()> {
        match *self {}
    }

    fn next_event(&mut self) -> impl Future<Output = WorkerEvent> {
        let never: std::future::Ready<WorkerEvent> = match *self {};
        never
    }

    fn terminate(&mut self) {
        match *self {}
    }
}

impl WorkerSpawner for NoWorkers {
    type Handle = NoWorker;

    fn is_available(&self) -> bool {
        false
    }

    fn spawn(&self) -> Result<NoWorker> {
        Err(ExportError::WorkerUnavailable(
            "this runtime cannot start workers".to_string(),
        ))
    }
}

/// Terminates the worker when the job is done, or when dropped.
struct WorkerGuard<H: WorkerHandle> {
    handle: Option<H>,
}

impl<H: WorkerHandle> WorkerGuard<H> {
    fn new(handle: H) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn handle_mut(&mut self) -> Result<&mut H> {
        self.handle
            .as_mut()
            .ok_or_else(|| ExportError::WorkerTransport("worker already terminated".to_string()))
    }

    fn terminate(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.terminate();
        }
    }
}

impl<H: WorkerHandle> Drop for WorkerGuard<H> {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Which strategy a job ran with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Worker,
    Inline,
}

/// Assembles the PDF on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineRenderer;

impl InlineRenderer {
    pub async fn render(&self, job: &mut ExportJob, request: WorkerRequest) -> Result<Vec<u8>> {
        let outcome = worker::handle_request(request).into_pdf();
        job.transition(if outcome.is_ok() {
            JobState::Completed
        } else {
            JobState::Failed
        });
        outcome
    }
}

/// Posts the request to a fresh worker and awaits its single answer.
pub struct WorkerBackedRenderer<'a, S: WorkerSpawner> {
    spawner: &'a S,
    timeout: Option<Duration>,
}

impl<'a, S: WorkerSpawner> WorkerBackedRenderer<'a, S> {
    pub fn new(spawner: &'a S, timeout: Option<Duration>) -> Self {
        Self { spawner, timeout }
    }

    pub async fn render(&self, job: &mut ExportJob, request: WorkerRequest) -> Result<Vec<u8>> {
        let handle = match self.spawner.spawn() {
            Ok(h) => h,
            Err(e) => {
                job.transition(JobState::Failed);
                return Err(e);
            }
        };
        let mut guard = WorkerGuard::new(handle);
        job.transition(JobState::Dispatched);

        let outcome = self.exchange(&mut guard, &request).await;

        job.transition(if outcome.is_ok() {
            JobState::Completed
        } else {
            JobState::Failed
        });
        guard.terminate();
        job.transition(JobState::Terminated);
        outcome
    }

    async fn exchange(
        &self,
        guard: &mut WorkerGuard<S::Handle>,
        request: &WorkerRequest,
    ) -> Result<Vec<u8>> {
        let handle = guard.handle_mut()?;
        handle.post(request)?;
        let event = with_deadline(handle.next_event(), self.timeout).await?;
        match event {
            WorkerEvent::Message(response) => {
                if response.filename != request.filename {
                    warn!(
                        expected = %request.filename,
                        got = %response.filename,
                        "worker answered for a different filename"
                    );
                }
                response.into_pdf()
            }
            WorkerEvent::Malformed(detail) => Err(ExportError::MalformedResponse(detail)),
            WorkerEvent::Error(detail) => Err(ExportError::WorkerTransport(detail)),
        }
    }
}

/// The strategy chosen for one job.
pub enum Renderer<'a, S: WorkerSpawner> {
    Worker(WorkerBackedRenderer<'a, S>),
    Inline(InlineRenderer),
}

impl<'a, S: WorkerSpawner> Renderer<'a, S> {
    /// Pick the strategy for a job.
    pub fn select(mode: OffloadMode, spawner: &'a S, timeout: Option<Duration>) -> Result<Self> {
        match mode {
            OffloadMode::Inline => Ok(Self::Inline(InlineRenderer)),
            OffloadMode::Auto if !spawner.is_available() => Ok(Self::Inline(InlineRenderer)),
            OffloadMode::Worker if !spawner.is_available() => Err(
                ExportError::WorkerUnavailable("worker offload is required".to_string()),
            ),
            OffloadMode::Auto | OffloadMode::Worker => {
                Ok(Self::Worker(WorkerBackedRenderer::new(spawner, timeout)))
            }
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            Self::Worker(_) => RendererKind::Worker,
            Self::Inline(_) => RendererKind::Inline,
        }
    }

    pub async fn render(&self, job: &mut ExportJob, request: WorkerRequest) -> Result<Vec<u8>> {
        match self {
            Self::Worker(r) => r.render(job, request).await,
            Self::Inline(r) => r.render(job, request).await,
        }
    }
}

/// Result of a coordinated job.
#[derive(Debug)]
pub struct JobReport {
    pub job: ExportJob,
    pub kind: Option<RendererKind>,
    pub outcome: Result<Vec<u8>>,
}

/// Chooses a strategy per job and drives it to completion.
#[derive(Debug, Clone, Copy)]
pub struct OffloadCoordinator {
    mode: OffloadMode,
    timeout: Option<Duration>,
}

impl OffloadCoordinator {
    pub fn new(mode: OffloadMode, timeout: Option<Duration>) -> Self {
        Self { mode, timeout }
    }

    /// Run one PDF job. Resolves exactly once, with the PDF bytes or the failure.
    pub async fn run<S: WorkerSpawner>(&self, spawner: &S, request: WorkerRequest) -> JobReport {
        let mut job = ExportJob::new(request.filename.clone());
        let renderer = match Renderer::select(self.mode, spawner, self.timeout) {
            Ok(r) => r,
            Err(e) => {
                job.transition(JobState::Failed);
                return JobReport {
                    job,
                    kind: None,
                    outcome: Err(e),
                };
            }
        };
        let kind = renderer.kind();
        debug!(job = job.id(), ?kind, filename = %job.filename(), "pdf job started");
        let outcome = renderer.render(&mut job, request).await;
        JobReport {
            job,
            kind: Some(kind),
            outcome,
        }
    }
}

async fn with_deadline<F>(event: F, timeout: Option<Duration>) -> Result<WorkerEvent>
where
    F: Future<Output = WorkerEvent>,
{
    let Some(limit) = timeout else {
        return Ok(event.await);
    };
    let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);

    #[cfg(not(target_arch = "wasm32"))]
    {
        use futures::future::{select, Either};

        let mut deadline = thread::Deadline::start(limit);
        futures::pin_mut!(event);
        let outcome = match select(event, deadline.fired()).await {
            Either::Left((ev, _)) => Ok(ev),
            Either::Right((Ok(()), _)) => Err(ExportError::Timeout(millis)),
            Either::Right((Err(_), event)) => {
                warn!("deadline timer unavailable, waiting without a limit");
                Ok(event.await)
            }
        };
        // Wakes the timer thread so it exits now rather than at the limit
        drop(deadline.cancel());
        outcome
    }

    #[cfg(target_arch = "wasm32")]
    {
        warn!(timeout_ms = millis, "worker deadlines are not enforced in the browser");
        Ok(event.await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use JobState::{Completed, Dispatched, Failed, Idle, Terminated};
        assert!(Idle.can_transition_to(Dispatched));
        assert!(Idle.can_transition_to(Completed));
        assert!(Dispatched.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Terminated));
        assert!(!Terminated.can_transition_to(Dispatched));
        assert!(!Dispatched.can_transition_to(Terminated));
        assert!(!Idle.can_transition_to(Terminated));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = ExportJob::new("a.pdf");
        let b = ExportJob::new("a.pdf");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.history(), &[JobState::Idle]);
    }

    #[test]
    fn test_select_strategy() {
        let none = NoWorkers;
        assert_eq!(
            Renderer::select(OffloadMode::Auto, &none, None).unwrap().kind(),
            RendererKind::Inline
        );
        assert!(matches!(
            Renderer::select(OffloadMode::Worker, &none, None),
            Err(ExportError::WorkerUnavailable(_))
        ));
    }
}
