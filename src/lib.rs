//! memevault backend library
//!
//! Exposes the auth core, video library and router for the binary and tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
pub mod videos;

pub use api::{build_router, AppContext};
pub use config::Config;
