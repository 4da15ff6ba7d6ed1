// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::cast_precision_loss,      // Acceptable for metrics/display
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. TransformerError in domain module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

//! Client for an external destination transformation service.
//!
//! Events are split into batches, POSTed concurrently to
//! `<base>/v0/destinations/<type>` and the per-event replies are partitioned
//! into successes and failures. See [`DestinationTransformer`].

pub mod app;
pub mod buffer;
pub mod domain;
pub mod reliability;
pub mod sender;
pub mod transformer;

pub use app::config::{ClientConfig, ClientType, RetryConfig, TransformerConfig, WarehouseConfig};
pub use domain::{
    FaultKind, Response, TransformerError, TransformerEvent, TransformerResponse,
};
pub use transformer::{BuildError, DestinationTransformer, DestinationTransformerBuilder};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
