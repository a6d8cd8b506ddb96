use std::{fmt, sync::mpsc::SendError};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

use crate::event::GraphEvent;

/// The crate-wide error taxonomy.
///
/// `InvalidArgument` covers null-equivalent or foreign-view handles passed to
/// an operation, `InvalidState` covers operations whose precondition does not
/// hold (removing an edge that is not indexed, grouping nodes without a common
/// parent), and `Invariant` marks a structural inconsistency that should never
/// occur when the positional index is correct. None of these are retried
/// internally; expected outcomes such as "edge already exists" are surfaced as
/// values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum NestGraphError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Structural invariant violated: {0}")]
    Invariant(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Event channel error: {0}")]
    Channel(String),
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<JsonError> for NestGraphError {
    fn from(src: JsonError) -> NestGraphError {
        NestGraphError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<fmt::Error> for NestGraphError {
    fn from(src: fmt::Error) -> NestGraphError {
        NestGraphError::Serialization(format!("{src}"))
    }
}

impl From<SendError<GraphEvent>> for NestGraphError {
    fn from(src: SendError<GraphEvent>) -> NestGraphError {
        NestGraphError::Channel(format!(
            "could not transmit structure change event {:?}",
            src.0
        ))
    }
}
