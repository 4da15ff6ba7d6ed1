pub mod batch;

pub use batch::{Batch, split_into_batches};
