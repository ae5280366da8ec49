//! HTTP API: server wiring, request gates and request/response mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
