//! 类型系统模块：TTKIA 查询、会话、反馈与目录的核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed results produced by the client. Everything here is plain
//! data: decoding and validation live in [`crate::decode`].
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`query`] | Query request builder and the structured query result |
//! | [`conversation`] | Conversations, their messages, and listing summaries |
//! | [`catalog`] | Health status and prompt/style listings |
//! | [`feedback`] | Feedback submission and acknowledgement |
//! | [`stream`] | Server-sent events of a streaming query |
//!
//! ## Example
//!
//! ```rust
//! use ttkia_sdk::types::QueryRequest;
//!
//! let request = QueryRequest::new("How do I configure OSPF?")
//!     .style("detailed")
//!     .web_search(true)
//!     .sources(["ospf-guide.pdf"]);
//! assert_eq!(request.style, "detailed");
//! ```

pub mod catalog;
pub mod conversation;
pub mod feedback;
pub mod query;
pub mod stream;

pub use catalog::{CatalogEntry, HealthStatus};
pub use conversation::{Conversation, ConversationMessage, ConversationSummary};
pub use feedback::{Feedback, FeedbackAck};
pub use query::{
    QueryRequest, QueryResponse, Source, SourceKind, ThinkingStep, Timing, TokenUsage,
};
pub use stream::{StreamEvent, StreamEventKind};
