//! Async TTKIA client.
//!
//! The public surface is [`Client`] plus its builder; the pieces behind it
//! (routes, retry policy, status classification, request execution) live in
//! submodules under `src/client/`.

pub mod builder;
mod cancel;
mod catalog;
mod conversations;
pub mod core;
mod endpoint;
mod error_classification;
mod execution;
mod feedback;
pub mod policy;
mod query;
pub mod signals;

pub use builder::ClientBuilder;
pub use cancel::CancelHandle;
pub use core::Client;
pub use policy::{RetryPolicy, RetryState};
pub use query::QueryStream;
pub use signals::InflightSnapshot;
