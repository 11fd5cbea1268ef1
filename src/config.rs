// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

use crate::{error::AppError, quiz::selection::SelectionStrategy};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub log_dir: String,
    pub bind_addr: SocketAddr,
    /// Strategy used when a student starts a new attempt.
    pub selection_strategy: SelectionStrategy,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::InternalServerError(format!("Invalid BIND_ADDR: {}", e)))?;

        let selection_strategy = match env::var("QUIZ_SELECTION") {
            Ok(value) => value.parse::<SelectionStrategy>()?,
            Err(_) => SelectionStrategy::Random,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            log_dir,
            bind_addr,
            selection_strategy,
        })
    }
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::InternalServerError(format!("{} must be set", name)))
}
