//! Personal task service: ownership-scoped task CRUD over HTTP plus a few
//! model-backed helpers for drafting, suggesting, categorising and summarising
//! tasks.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod store;
pub mod tasks;

pub use routes::{cors_layer, router, AppState};
