//! Native workers: one OS thread per job.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures::channel::{mpsc as async_mpsc, oneshot};
use futures::StreamExt;
use tracing::{debug, error};

use super::worker::handle_request;
use super::{WorkerEvent, WorkerHandle, WorkerSpawner};
use crate::error::{ExportError, Result};
use crate::types::WorkerRequest;

/// Starts a [`ThreadWorker`] per job. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl WorkerSpawner for ThreadSpawner {
    type Handle = ThreadWorker;

    fn is_available(&self) -> bool {
        true
    }

    fn spawn(&self) -> Result<ThreadWorker> {
        ThreadWorker::start()
    }
}

pub struct ThreadWorker {
    requests: Option<mpsc::Sender<WorkerRequest>>,
    events: async_mpsc::UnboundedReceiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    fn start() -> Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<WorkerRequest>();
        let (ev_tx, ev_rx) = async_mpsc::unbounded();
        let thread = thread::Builder::new()
            .name("pdf-worker".to_string())
            .spawn(move || worker_loop(&req_rx, &ev_tx))?;
        debug!("pdf worker thread started");
        Ok(Self {
            requests: Some(req_tx),
            events: ev_rx,
            thread: Some(thread),
        })
    }
}

fn worker_loop(
    requests: &mpsc::Receiver<WorkerRequest>,
    events: &async_mpsc::UnboundedSender<WorkerEvent>,
) {
    while let Ok(request) = requests.recv() {
        // Only effective where panics unwind; with `panic = "abort"` a panic
        // here takes the process down
        let event = match panic::catch_unwind(AssertUnwindSafe(|| handle_request(request))) {
            Ok(response) => WorkerEvent::Message(response),
            Err(_) => {
                error!("pdf worker panicked");
                WorkerEvent::Error("worker panicked".to_string())
            }
        };
        if events.unbounded_send(event).is_err() {
            break;
        }
    }
}

impl WorkerHandle for ThreadWorker {
    fn post(&mut self, request: &WorkerRequest) -> Result<()> {
        let tx = self
            .requests
            .as_ref()
            .ok_or_else(|| ExportError::WorkerTransport("worker terminated".to_string()))?;
        tx.send(request.clone())
            .map_err(|_| ExportError::WorkerTransport("worker thread has exited".to_string()))
    }

    async fn next_event(&mut self) -> WorkerEvent {
        self.events
            .next()
            .await
            .unwrap_or_else(|| WorkerEvent::Error("worker channel closed".to_string()))
    }

    fn terminate(&mut self) {
        // Closing the request channel ends the loop once any in-flight job returns
        self.requests.take();
        self.events.close();
        if self.thread.take().is_some() {
            debug!("pdf worker thread released");
        }
    }
}

/// A one-shot timer on its own thread.
///
/// The timer thread waits on a cancel channel, so dropping or cancelling the
/// deadline wakes it and lets it exit instead of sleeping out the full limit.
pub(super) struct Deadline {
    fired: oneshot::Receiver<()>,
    cancel: Option<mpsc::Sender<()>>,
    timer: Option<JoinHandle<()>>,
}

impl Deadline {
    pub(super) fn start(limit: Duration) -> Self {
        let (fire_tx, fired) = oneshot::channel();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("pdf-worker-deadline".to_string())
            .spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(limit) {
                    let _ = fire_tx.send(());
                }
            });
        let timer = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Sender dropped with the closure; `fired` resolves as cancelled
                error!(error = %e, "could not start deadline timer");
                None
            }
        };
        Self {
            fired,
            cancel: Some(cancel_tx),
            timer,
        }
    }

    /// Resolves with `Ok` once the limit elapses, or `Err` if no timer is running.
    pub(super) fn fired(&mut self) -> &mut oneshot::Receiver<()> {
        &mut self.fired
    }

    /// Stop the timer. Returns its thread so callers may join it.
    pub(super) fn cancel(mut self) -> Option<JoinHandle<()>> {
        self.cancel.take();
        self.timer.take()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.cancel.take();
    }
}
