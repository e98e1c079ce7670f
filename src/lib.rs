//! Core library for music-collection-bulk-ops
pub mod config;
pub mod models;
pub mod api;
pub mod pagination;
pub mod state;
pub mod executor;
pub mod broadcast;
pub mod protocol;
pub mod engine;
pub mod channel;
pub mod server;
