//! Configuration management for the escrow-agent server
//!
//! Loads and validates configuration from environment variables, with
//! support for different environments (development, staging, production).

use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC URL of the signing gateway that holds the wallet and
    /// submits transactions on our behalf
    pub signing_gateway_url: String,

    /// Soroban RPC URL for event polling
    pub soroban_rpc_url: String,

    /// Escrow agent contract ID
    pub contract_id: String,

    /// Network passphrase for the Stellar network
    pub network_passphrase: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Seconds between event-poll requests
    pub event_poll_secs: u64,

    /// Seconds between full ledger snapshot refreshes
    pub snapshot_refresh_secs: u64,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let signing_gateway_url = env::var("SIGNING_GATEWAY_URL")
            .map_err(|_| ConfigError::MissingEnvVar("SIGNING_GATEWAY_URL".to_string()))?;

        let soroban_rpc_url = env::var("SOROBAN_RPC_URL")
            .unwrap_or_else(|_| "https://soroban-testnet.stellar.org".to_string());

        let contract_id = env::var("CONTRACT_ID")
            .map_err(|_| ConfigError::MissingEnvVar("CONTRACT_ID".to_string()))?;

        let network_passphrase = env::var("NETWORK_PASSPHRASE")
            .unwrap_or_else(|_| "Test SDF Network ; September 2015".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let event_poll_secs = env::var("EVENT_POLL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .unwrap_or(5);

        let snapshot_refresh_secs = env::var("SNAPSHOT_REFRESH_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .unwrap_or(60);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            signing_gateway_url,
            soroban_rpc_url,
            contract_id,
            network_passphrase,
            environment,
            port,
            event_poll_secs,
            snapshot_refresh_secs,
            cors_allowed_origins,
            log_level,
        })
    }
}
