//! Messages exchanged between a dispatcher and its worker.

use serde::{Deserialize, Serialize};

/// Payload of a `result` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// The numbers sent with `start`, echoed back.
    pub input: Vec<f64>,
    /// The aggregate computed by the workload.
    pub result: f64,
}

impl Outcome {
    /// Render the `result` message carrying this outcome as it would cross
    /// the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&Message::Result(self.clone()))
    }
}

/// Message crossing the worker boundary. Serialized as
/// `{"type": "start" | "result", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    Start(Vec<f64>),
    Result(Outcome),
}

impl Message {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Result(_) => "result",
        }
    }
}

/// Notification delivered from a worker thread to the host.
///
/// Results, errors and exits travel as separate events; an error never
/// masquerades as a result value.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Message(Message),
    Error(String),
    Exit(i32),
}
