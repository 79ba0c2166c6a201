//! REST API implementation for platemate
//!
//! Exposes detection session control, state snapshots, the recipe catalog,
//! and the SSE event stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, AppContext};
