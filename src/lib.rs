//! Gatectl - administrative control plane for a reverse proxy's host routes
//!
//! This library provides the stateful core behind a proxy admin panel:
//! - Rate-limits login attempts per client with a sliding window and lockout
//! - Persists domain -> backend routes to the config file the proxy reads
//! - Persists short per-domain operator notes alongside the routes
//! - Signals the embedding layer when the proxy must reload its config
//!
//! The HTTP/UI layer that drives these components lives outside this crate
//! and interacts only through the public methods here. All operations are
//! synchronous and safe to call from concurrent request handlers.

pub mod notes;
pub mod ratelimit;
pub mod routes;
pub mod store;
