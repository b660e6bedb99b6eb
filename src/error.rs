use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::ExecutionError;
use crate::event_bus::EventError;
use crate::progress::ProgressError;
use crate::store::StoreError;
use crate::workspace::WorkspaceError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
