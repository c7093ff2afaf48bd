//! Standalone weather tool server.
//!
//! A small HTTP service that advertises two tools, `get-forecast` and
//! `get-alerts`, and executes them against Open-Meteo. Everything speaks
//! JSON over a single `POST /` endpoint with a `type` discriminator:
//!
//! - `{"type": "schema"}` returns the tool schema
//! - `{"type": "execute", "tools": [...]}` runs the named tools
//!
//! Any other `type` gets `{"error": "Invalid request type"}` with a 200, so
//! clients can always parse the body the same way.
//!
//! The weather logic itself lives in [`parley_rs::tools::weather`]; this
//! crate only puts an HTTP surface in front of it.

pub mod routes;

pub use routes::{AppState, build_router};
