// src/lib.rs

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod models;
pub mod quiz;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

pub use routes::create_router;
