use std::io;
use thiserror::Error;

/// the machine refused a program image (too big, bad alignment, whatever
/// the machine cares about)
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct TransferError {
    pub reason: String,
}

impl TransferError {
    pub fn new(reason: impl Into<String>) -> Self {
        TransferError {
            reason: reason.into(),
        }
    }
}

/// why a ROM never made it into the machine
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("couldn't fetch ROM '{name}': {source}")]
    Fetch {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("couldn't transfer ROM '{name}' into machine memory: {source}")]
    Transfer {
        name: String,
        #[source]
        source: TransferError,
    },
    #[error("fetch of ROM '{name}' was abandoned")]
    Abandoned { name: String },
}

/// a control command that doesn't apply in the current state. these are
/// reported and otherwise ignored
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("no program has been loaded yet")]
    NotLoaded,
    #[error("already running")]
    AlreadyRunning,
    #[error("not running")]
    NotRunning,
    #[error("can't step while running")]
    StepWhileRunning,
    #[error("a ROM has already been requested for this session")]
    LoadAlreadyRequested,
    #[error("the machine faulted; start a new session")]
    Faulted,
}
