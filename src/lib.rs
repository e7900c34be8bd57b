//! # ttkia-sdk
//!
//! TTKIA 知识助手的 Rust 客户端：查询、会话、反馈与导出。
//!
//! Client SDK for the TTKIA knowledge assistant.
//!
//! ## Overview
//!
//! The crate is a request orchestration layer in front of the TTKIA HTTP API:
//! it attaches the right credential, retries rate-limited and transient
//! failures with bounded backoff, and decodes the backend's loosely shaped
//! responses into stable structured results (answer text, confidence, sources,
//! token usage, per-stage timing, optional chain-of-thought trace).
//!
//! - **One async core**: [`Client`] is `Clone + Send + Sync` and safe to share across tasks
//! - **Blocking adapter**: [`blocking::Client`] mirrors every operation for synchronous callers
//! - **Explicit retry policy**: [`RetryPolicy`] drives a small, inspectable state machine
//! - **One error type**: every failure is an [`Error`] variant
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ttkia_sdk::{Client, types::QueryRequest};
//!
//! #[tokio::main]
//! async fn main() -> ttkia_sdk::Result<()> {
//!     let client = Client::builder("https://ttkia.example.com")
//!         .api_key("ttkia_sk_...")
//!         .build()?;
//!
//!     let first = client.query(&QueryRequest::new("What is BGP?")).await?;
//!     println!("{first}");
//!
//!     // Continue the same conversation
//!     let follow_up = QueryRequest::new("And OSPF?").conversation_id(&first.conversation_id);
//!     let second = client.query(&follow_up).await?;
//!     assert_eq!(second.conversation_id, first.conversation_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Async client, builder, retry policy, cancellation |
//! | [`blocking`] | Blocking adapter over the async client |
//! | [`types`] | Requests and structured results |
//! | [`decode`] | Response decoding and validation |
//! | [`auth`] | Credential selection |
//! | [`config`] | Layered configuration (arguments, environment, file) |
//! | [`transport`] | HTTP transport seam |

pub mod auth;
pub mod blocking;
pub mod client;
pub mod config;
pub mod decode;
mod sse;
pub mod transport;
pub mod types;

pub use client::{
    CancelHandle, Client, ClientBuilder, InflightSnapshot, QueryStream, RetryPolicy, RetryState,
};
pub use config::ClientConfig;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
