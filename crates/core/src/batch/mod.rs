//! Work items and batch construction.
//!
//! Items whose effective generation parameters and audio prompt match are
//! grouped into batches; each batch becomes exactly one remote job.

mod builder;
mod types;

pub use builder::{build_batches, compatibility_key};
pub use types::*;
