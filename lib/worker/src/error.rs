use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to spawn clustering worker: {0}")]
    Spawn(String),

    /// A fault raised inside the worker, rebuilt on the caller's side
    #[error("Clustering failed: {message}")]
    Execution { message: String, stack_trace: String },

    #[error("Clustering worker is gone")]
    WorkerGone,

    #[error("Unexpected worker response: {0}")]
    UnexpectedResponse(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error(transparent)]
    Core(#[from] facegroup_core::Error),
}

impl Error {
    /// Stack trace captured inside the worker, if this is an execution fault
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            Error::Execution { stack_trace, .. } => Some(stack_trace),
            _ => None,
        }
    }
}
