//! Remote job service abstraction.
//!
//! This module provides a `RemoteJobClient` trait for the submit / status /
//! cancel contract of a batched, asynchronous job service, and an HTTP
//! implementation for RunPod serverless endpoints.

mod runpod;
mod types;

pub use runpod::RunpodClient;
pub use types::*;
