//! Dispatcher — sends one unit of work to a background worker and settles
//! exactly once.
//!
//! `dispatch()` never blocks: it spawns the worker thread, posts the `start`
//! message and hands the worker's event stream to a pump task on the host
//! runtime. The pump drives the [`DispatchState`] machine, invokes the
//! registered handler and resolves the returned [`PendingCall`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compute::Workload;
use crate::error::DispatchError;
use crate::worker::message::{Message, Outcome, WorkerEvent};
use crate::worker::runtime::WorkerHandle;
use crate::worker::state::{DispatchContext, DispatchState};

type ResultHandler = Box<dyn FnOnce(&Outcome) + Send>;
type ErrorHandler = Box<dyn FnOnce(&DispatchError) + Send>;
type Reply = oneshot::Sender<Result<Outcome, DispatchError>>;

#[derive(Default)]
struct Handlers {
    on_result: Option<ResultHandler>,
    on_error: Option<ErrorHandler>,
}

/// Single-shot coordinator for one background computation.
pub struct Dispatcher {
    workload: Option<Box<dyn Workload>>,
    handlers: Handlers,
    context: Arc<Mutex<DispatchContext>>,
    worker: Option<WorkerHandle>,
    pump: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Create an idle dispatcher for `workload`.
    pub fn new(workload: impl Workload) -> Self {
        Self {
            workload: Some(Box::new(workload)),
            handlers: Handlers::default(),
            context: Arc::new(Mutex::new(DispatchContext::new())),
            worker: None,
            pump: None,
        }
    }

    /// Register the success handler.
    pub fn on_result(mut self, handler: impl FnOnce(&Outcome) + Send + 'static) -> Self {
        self.handlers.on_result = Some(Box::new(handler));
        self
    }

    /// Register the error handler. Receives worker faults and abnormal
    /// terminations.
    pub fn on_error(mut self, handler: impl FnOnce(&DispatchError) + Send + 'static) -> Self {
        self.handlers.on_error = Some(Box::new(handler));
        self
    }

    /// Send `payload` to a freshly spawned worker.
    ///
    /// Must be called within a tokio runtime. Returns immediately; the
    /// returned future settles once with the result or the failure. A
    /// dispatcher accepts only one dispatch.
    pub fn dispatch(&mut self, payload: Vec<f64>) -> Result<PendingCall, DispatchError> {
        if self.state() != DispatchState::Idle {
            return Err(DispatchError::AlreadyDispatched);
        }
        let workload = self
            .workload
            .take()
            .ok_or(DispatchError::AlreadyDispatched)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(workload, events_tx).map_err(|e| self.abandon(e))?;
        let worker_id = worker.id();

        let len = payload.len();
        worker
            .post(Message::Start(payload))
            .map_err(|e| self.abandon(e))?;
        lock(&self.context)
            .transition_to(DispatchState::Dispatched, None)
            .map_err(|reason| {
                warn!(worker_id = %worker_id, %reason, "Unexpected dispatch state");
                DispatchError::AlreadyDispatched
            })?;

        info!(worker_id = %worker_id, len, "Dispatched start message");

        let (reply_tx, reply_rx) = oneshot::channel();
        let settlement = Settlement {
            worker_id,
            context: Arc::clone(&self.context),
            handlers: std::mem::take(&mut self.handlers),
            reply: Some(reply_tx),
        };
        self.pump = Some(tokio::spawn(pump(events_rx, settlement)));
        self.worker = Some(worker);

        Ok(PendingCall {
            worker_id,
            rx: reply_rx,
        })
    }

    /// Record a dispatch that failed before the worker got its `start`
    /// message. The dispatcher ends `Terminated`.
    fn abandon(&self, err: DispatchError) -> DispatchError {
        let reason = err.to_string();
        let mut ctx = lock(&self.context);
        for (state, reason) in [
            (DispatchState::Dispatched, None),
            (DispatchState::Terminated, Some(reason.clone())),
        ] {
            if let Err(e) = ctx.transition_to(state, reason) {
                debug!(reason = %e, "Skipping transition for failed dispatch");
            }
        }
        warn!(%reason, "Dispatch failed before the worker started");
        err
    }

    /// Current state of the dispatch.
    pub fn state(&self) -> DispatchState {
        lock(&self.context).state
    }

    /// Snapshot of the state and its transition history.
    pub fn context(&self) -> DispatchContext {
        lock(&self.context).clone()
    }

    /// Id of the worker, once dispatched.
    pub fn worker_id(&self) -> Option<Uuid> {
        self.worker.as_ref().map(WorkerHandle::id)
    }

    /// Release the worker and stop listening to it. Pending notifications
    /// are dropped and an outstanding [`PendingCall`] resolves to
    /// `Disconnected`; a worker that is mid-computation is detached and runs
    /// to completion.
    pub fn close(mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.release_worker();
    }

    fn release_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.close();
            debug!(
                worker_id = %worker.id(),
                finished = worker.is_finished(),
                "Worker handle released"
            );
        }
    }
}

/// Dropping a dispatcher only closes the worker inbox. The pump keeps running
/// until the worker settles, so handlers and the [`PendingCall`] still fire.
impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.release_worker();
    }
}

fn lock(context: &Mutex<DispatchContext>) -> MutexGuard<'_, DispatchContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Future for the single outstanding call of a [`Dispatcher`].
#[derive(Debug)]
pub struct PendingCall {
    worker_id: Uuid,
    rx: oneshot::Receiver<Result<Outcome, DispatchError>>,
}

impl PendingCall {
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }
}

impl Future for PendingCall {
    type Output = Result<Outcome, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::Disconnected)))
    }
}

/// The pump-side half of a dispatch: settles at most once.
struct Settlement {
    worker_id: Uuid,
    context: Arc<Mutex<DispatchContext>>,
    handlers: Handlers,
    reply: Option<Reply>,
}

impl Settlement {
    fn is_settled(&self) -> bool {
        self.reply.is_none()
    }

    fn settle(&mut self, result: Result<Outcome, DispatchError>) {
        let (target, reason) = match &result {
            Ok(_) => (DispatchState::Completed, None),
            Err(e @ DispatchError::WorkerFault { .. }) => (DispatchState::Faulted, Some(e.to_string())),
            Err(e) => (DispatchState::Terminated, Some(e.to_string())),
        };

        if let Err(reason) = lock(&self.context).transition_to(target, reason) {
            debug!(worker_id = %self.worker_id, %reason, "Ignoring late worker notification");
            return;
        }

        match &result {
            Ok(outcome) => {
                if let Some(handler) = self.handlers.on_result.take() {
                    handler(outcome);
                }
            }
            Err(err) => {
                if let Some(handler) = self.handlers.on_error.take() {
                    handler(err);
                }
            }
        }

        if let Some(reply) = self.reply.take() {
            // The caller may have dropped the pending call.
            let _ = reply.send(result);
        }
    }
}

async fn pump(mut events: mpsc::UnboundedReceiver<WorkerEvent>, mut settlement: Settlement) {
    let worker_id = settlement.worker_id;

    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Message(Message::Result(outcome)) => {
                debug!(worker_id = %worker_id, result = outcome.result, "Result received");
                settlement.settle(Ok(outcome));
            }
            WorkerEvent::Message(other) => {
                warn!(worker_id = %worker_id, kind = other.kind(), "Unexpected message from worker");
            }
            WorkerEvent::Error(reason) => {
                error!(worker_id = %worker_id, %reason, "Worker error");
                settlement.settle(Err(DispatchError::WorkerFault { reason }));
            }
            WorkerEvent::Exit(code) => {
                if code != 0 {
                    error!(worker_id = %worker_id, code, "Worker stopped with exit code {code}");
                } else {
                    debug!(worker_id = %worker_id, "Worker exited");
                }
                if !settlement.is_settled() {
                    settlement.settle(Err(if code == 0 {
                        DispatchError::Disconnected
                    } else {
                        DispatchError::AbnormalTermination { code }
                    }));
                }
                return;
            }
        }
    }

    if !settlement.is_settled() {
        warn!(worker_id = %worker_id, "Worker event channel closed without exit");
        settlement.settle(Err(DispatchError::Disconnected));
    }
}
