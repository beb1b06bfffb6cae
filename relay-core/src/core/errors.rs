//! Domain-specific error types for the dispatch engine
//!
//! A failing handler never stops the loop. Each failure is turned into a
//! [`DispatchFailure`] and reported to the engine's failure sink.

use crate::event::EventKind;
use thiserror::Error;

/// Why a handler invocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The handler returned an error
    Error(String),
    /// The handler panicked; the payload message is captured when it is a string
    Panic(String),
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Error(msg) => write!(f, "error: {}", msg),
            FailureCause::Panic(msg) => write!(f, "panic: {}", msg),
        }
    }
}

/// A handler failed while processing one event
///
/// The remaining handlers of that chain were skipped for this event only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler '{handler}' failed on {kind} event (topic '{topic}'): {cause}")]
pub struct DispatchFailure {
    pub handler: String,
    pub kind: EventKind,
    pub topic: String,
    pub cause: FailureCause,
}

/// Errors surfaced by engine lifecycle operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// `join()` was called from the consumer thread itself
    #[error("join() called from the dispatch thread would deadlock")]
    JoinFromLoop,

    /// `start()` was called from a handler after the loop was told to stop
    #[error("start() called from a stopping dispatch thread would join itself")]
    StartFromLoop,

    /// The consumer thread terminated by panicking outside any handler
    #[error("dispatch thread panicked: {0}")]
    WorkerPanicked(String),

    /// The consumer thread could not be spawned
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}
