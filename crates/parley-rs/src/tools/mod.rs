//! Tool trait, registry, and built-in tools.

pub mod core;
pub mod editor;
pub mod shell;
pub mod weather;
