//! Messages exchanged between the host and the clustering thread.
//!
//! Everything crossing the boundary is owned and serde-serializable; the
//! worker shares no mutable memory with its caller.

use std::any::Any;
use std::backtrace::Backtrace;

use facegroup_core::{AssignmentDelta, CreationTimes, FaceInput};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerRequest {
    RunClustering {
        faces: Vec<FaceInput>,
        creation_times: Option<CreationTimes>,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerResponse {
    Clustered(AssignmentDelta),
    ShutDown,
}

/// A fault raised while handling a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFault {
    pub error: String,
    pub stack_trace: String,
}

impl WorkerFault {
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self {
            error: err.to_string(),
            stack_trace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let error = if let Some(msg) = payload.downcast_ref::<&str>() {
            format!("worker panicked: {msg}")
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            format!("worker panicked: {msg}")
        } else {
            "worker panicked".to_string()
        };
        Self {
            error,
            stack_trace: Backtrace::force_capture().to_string(),
        }
    }
}

pub type WorkerReply = std::result::Result<WorkerResponse, WorkerFault>;

/// A request tagged with its own one-shot reply channel
#[derive(Debug)]
pub struct WorkerEnvelope {
    pub request_id: Uuid,
    pub request: WorkerRequest,
    pub reply: oneshot::Sender<WorkerReply>,
}

impl WorkerEnvelope {
    pub fn new(request: WorkerRequest) -> (Self, oneshot::Receiver<WorkerReply>) {
        let (reply, rx) = oneshot::channel();
        let envelope = Self {
            request_id: Uuid::new_v4(),
            request,
            reply,
        };
        (envelope, rx)
    }
}
