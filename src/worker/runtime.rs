//! Worker runtime — one OS thread per worker, driven by messages.
//!
//! The thread blocks until a `start` message arrives, runs the workload to
//! completion without yielding, then reports back on the event channel:
//! - success: `Message(Result)` followed by `Exit(0)`
//! - fault or panic: `Error(reason)` followed by `Exit(1)`
//! - requested exit: `Exit(code)` only
//!
//! The worker handles exactly one `start`; the thread ends afterwards.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compute::{Workload, WorkloadError};
use crate::error::DispatchError;
use crate::worker::message::{Message, Outcome, WorkerEvent};

/// Exit code reported when the workload faults.
pub const FAULT_EXIT_CODE: i32 = 1;

/// Handle to a running worker thread. Owned by exactly one dispatcher.
#[derive(Debug)]
pub struct WorkerHandle {
    id: Uuid,
    inbox: Option<mpsc::UnboundedSender<Message>>,
    thread: Option<JoinHandle<i32>>,
}

impl WorkerHandle {
    /// Spawn a worker thread that reports on `events`.
    pub fn spawn(
        workload: Box<dyn Workload>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<Self, DispatchError> {
        let id = Uuid::new_v4();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(format!("offload-worker-{}", &id.simple().to_string()[..8]))
            .spawn(move || run_worker(id, workload, inbox_rx, events))
            .map_err(|e| DispatchError::Spawn(e.to_string()))?;

        debug!(worker_id = %id, "Worker thread spawned");

        Ok(Self {
            id,
            inbox: Some(inbox_tx),
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Send a message to the worker. The payload is moved across the
    /// boundary; nothing is shared with the worker thread.
    pub fn post(&self, msg: Message) -> Result<(), DispatchError> {
        let inbox = self.inbox.as_ref().ok_or(DispatchError::Disconnected)?;
        inbox.send(msg).map_err(|_| DispatchError::Disconnected)
    }

    /// Whether the worker thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Close the inbox. A worker still waiting for `start` exits with code 0;
    /// one already computing runs to completion.
    pub fn close(&mut self) {
        self.inbox.take();
    }

    /// Block until the worker thread ends and return its exit code.
    /// A thread that died outside the workload guard reports `None`.
    pub fn join(mut self) -> Option<i32> {
        self.close();
        self.thread.take()?.join().ok()
    }
}

fn run_worker(
    id: Uuid,
    workload: Box<dyn Workload>,
    mut inbox: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> i32 {
    let input = loop {
        match inbox.blocking_recv() {
            Some(Message::Start(data)) => break data,
            Some(other) => {
                warn!(worker_id = %id, kind = other.kind(), "Worker ignoring unexpected message");
            }
            None => {
                debug!(worker_id = %id, "Inbox closed before start");
                let _ = events.send(WorkerEvent::Exit(0));
                return 0;
            }
        }
    };

    info!(worker_id = %id, len = input.len(), "Worker starting computation");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| workload.run(&input)));

    // Sends fail only if the dispatcher is gone; nothing is left to tell.
    let code = match outcome {
        Ok(Ok(result)) => {
            let _ = events.send(WorkerEvent::Message(Message::Result(Outcome { input, result })));
            0
        }
        Ok(Err(WorkloadError::Fault(reason))) => {
            let _ = events.send(WorkerEvent::Error(reason));
            FAULT_EXIT_CODE
        }
        Ok(Err(WorkloadError::Exit(code))) => code,
        Err(payload) => {
            let _ = events.send(WorkerEvent::Error(panic_message(payload.as_ref())));
            FAULT_EXIT_CODE
        }
    };

    debug!(worker_id = %id, code, "Worker exiting");
    let _ = events.send(WorkerEvent::Exit(code));
    code
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
