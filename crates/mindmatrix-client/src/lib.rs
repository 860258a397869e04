//! # mindmatrix-client
//!
//! Async HTTP clients for a running MindMatrix server and for OpenAI-style
//! reranking services.
//!
//! ```rust,ignore
//! use mindmatrix_client::{ChatKind, ChatRequest, Message, MindMatrixClient};
//!
//! let client = MindMatrixClient::new("http://localhost:9527").with_api_key("secret");
//! let request = ChatRequest::new("chatter", vec![Message::user("hi")]).kind(ChatKind::Agent);
//! let reply = client.chat_completion(request).await?;
//! ```
//!
//! The transport layer ([`HttpClient`]) never fails: every request yields an
//! [`HttpResult`]. The typed clients turn non-200 results into [`ClientError`].

pub mod error;
pub mod http;
pub mod mindmatrix;
pub mod reranker;

pub use error::{ClientError, Result};
pub use http::{HttpClient, HttpResult, DEFAULT_TIMEOUT};
pub use mindmatrix::{ChatKind, ChatRequest, Message, MindMatrixClient, DEFAULT_SERVER_URL};
pub use reranker::{RerankerClient, DEFAULT_RERANKER_URL};
