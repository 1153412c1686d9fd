//! HTTP request handlers.

pub mod health;
pub mod songs;

pub use health::*;
pub use songs::*;
