//! Worker system — offloading one computation to a background thread.
//!
//! Core components:
//! - `message` — Wire messages (`start`, `result`) and host-side worker events
//! - `state` — Dispatch state machine (Idle → Dispatched → Completed/Faulted/Terminated)
//! - `runtime` — Worker thread: waits for `start`, computes, reports once
//! - `dispatcher` — Single-shot coordinator with result/error handlers

pub mod dispatcher;
pub mod message;
pub mod runtime;
pub mod state;

pub use dispatcher::{Dispatcher, PendingCall};
pub use message::{Message, Outcome, WorkerEvent};
pub use runtime::WorkerHandle;
pub use state::{DispatchContext, DispatchState};
