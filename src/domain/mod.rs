//! Domain layer for dest-transformer.
//!
//! Contains the canonical types shared across all modules:
//! - `TransformerEvent`: one event record bound for a destination
//! - `TransformerResponse` / `Response`: per-event results and the aggregate result
//! - `TransformerError`: the outcome of a call that could not produce a result

pub mod error;
pub mod event;
pub mod response;

pub use error::{FaultKind, TransformerError};
pub use event::{
    Credential, Destination, DestinationDefinition, Message, Metadata, Transformation,
    TransformerEvent,
};
pub use response::{
    Response, TRANSFORMER_REQUEST_FAILURE, TRANSFORMER_REQUEST_TIMEOUT, TransformerResponse,
};
