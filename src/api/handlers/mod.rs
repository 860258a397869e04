/// OpenAI-compatible chat completion handlers.
pub mod chat;
/// Liveness endpoint.
pub mod health;
/// Per-user memory CRUD.
pub mod memory;
/// Named server-sent event streaming.
pub mod sse;
