//! # PlateMate Detection Service
//!
//! Classifies live camera frames into food labels, resolves labels against
//! a static recipe catalog, and concurrently fetches matching retail
//! products for every ingredient in the recipe.
//!
//! **Architecture:** One cooperative detection loop per session feeding a
//! stability filter; product resolution is the only fan-out concurrency.
//! Control and observation happen over HTTP/SSE.

pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod events;
pub mod kb;
pub mod resolver;
pub mod state;

pub use error::{Error, Result};
pub use state::SessionState;
