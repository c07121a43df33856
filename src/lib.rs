//! Library crate for spy-game-back, exposing modules for binaries and integration tests.

/// Configuration file loading.
pub mod config;
/// Key-value store backends, locks and repositories.
pub mod dao;
/// Request and response bodies.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers.
pub mod routes;
/// Business operations behind the routes.
pub mod services;
/// Shared state and game rules.
pub mod state;
