//! API support: retry with backoff, cost tracking, SSE streaming.

pub mod cost;
pub mod retry;
pub mod stream;
