//! Browser workers (`web_sys::Worker`), one per job.
//!
//! Workers are started as module workers. `js/pdf-worker.js` is the script
//! they run: it loads this crate and answers each message with
//! `handle_worker_message`.

use futures::channel::mpsc;
use futures::StreamExt;
use js_sys::Reflect;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{ErrorEvent, MessageEvent, Worker, WorkerOptions, WorkerType};

use super::{WorkerEvent, WorkerHandle, WorkerSpawner};
use crate::error::{ExportError, Result};
use crate::browser::response_from_js;
use crate::types::WorkerRequest;

#[derive(Debug, Clone)]
pub struct WebWorkerSpawner {
    script_url: String,
}

impl WebWorkerSpawner {
    pub fn new(script_url: impl Into<String>) -> Self {
        Self {
            script_url: script_url.into(),
        }
    }
}

impl WorkerSpawner for WebWorkerSpawner {
    type Handle = WebWorker;

    fn is_available(&self) -> bool {
        Reflect::has(&js_sys::global(), &JsValue::from_str("Worker")).unwrap_or(false)
    }

    fn spawn(&self) -> Result<WebWorker> {
        let options = WorkerOptions::new();
        options.set_type(WorkerType::Module);
        let worker = Worker::new_with_options(&self.script_url, &options)
            .map_err(|e| ExportError::WorkerUnavailable(format!("{e:?}")))?;
        let (tx, events) = mpsc::unbounded();

        let on_message = {
            let tx = tx.clone();
            Closure::wrap(Box::new(move |event: MessageEvent| {
                let tx = tx.clone();
                // Reading a posted Blob is asynchronous
                wasm_bindgen_futures::spawn_local(async move {
                    let ev = match response_from_js(event.data()).await {
                        Ok(response) => WorkerEvent::Message(response),
                        Err(e) => WorkerEvent::Malformed(e.to_string()),
                    };
                    let _ = tx.unbounded_send(ev);
                });
            }) as Box<dyn FnMut(MessageEvent)>)
        };
        let on_error = Closure::wrap(Box::new(move |event: ErrorEvent| {
            let _ = tx.unbounded_send(WorkerEvent::Error(event.message()));
        }) as Box<dyn FnMut(ErrorEvent)>);

        worker.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        worker.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        Ok(WebWorker {
            worker,
            events,
            _on_message: on_message,
            _on_error: on_error,
        })
    }
}

pub struct WebWorker {
    worker: Worker,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    // Kept alive for as long as the worker can call them
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(ErrorEvent)>,
}

impl WorkerHandle for WebWorker {
    fn post(&mut self, request: &WorkerRequest) -> Result<()> {
        let message = serde_wasm_bindgen::to_value(request)
            .map_err(|e| ExportError::WorkerTransport(e.to_string()))?;
        self.worker
            .post_message(&message)
            .map_err(|e| ExportError::WorkerTransport(format!("{e:?}")))
    }

    async fn next_event(&mut self) -> WorkerEvent {
        self.events
            .next()
            .await
            .unwrap_or_else(|| WorkerEvent::Error("worker channel closed".to_string()))
    }

    fn terminate(&mut self) {
        self.worker.set_onmessage(None);
        self.worker.set_onerror(None);
        self.worker.terminate();
        self.events.close();
    }
}
