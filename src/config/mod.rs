//! Manages application configuration loaded from environment variables.
//!
//! This module defines the `Config` struct which holds all runtime settings
//! and provides the `from_env` function to populate this struct. It supports
//! loading variables from a `.env` file via the `dotenv` crate and provides
//! default values for optional settings.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Holds the application's runtime configuration settings.
///
/// These settings are typically loaded from environment variables via `from_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The identity the SMTP engine announces in its welcome banner and
    /// `HELO`/`EHLO` replies. (Optional: `SMTP_ENGINE_HOSTNAME`, Default: "smtp-engine")
    pub hostname: String,

    /// The IP address the SMTP server should listen on. (Optional: `SMTP_ENGINE_BIND_ADDRESS`, Default: "0.0.0.0")
    pub smtp_bind_address: String,

    /// The network port the SMTP server should listen on. (Optional: `SMTP_ENGINE_PORT`, Default: 2525)
    pub smtp_port: u16,

    /// The IP address the health check HTTP server should listen on. (Optional: `SMTP_ENGINE_HEALTH_BIND_ADDRESS`, Default: "0.0.0.0")
    pub health_check_bind_address: String,

    /// The network port the health check HTTP server should listen on. (Optional: `SMTP_ENGINE_HEALTH_PORT`, Default: 8080)
    pub health_check_port: u16,

    /// Maximum accepted length, in bytes, of a single client-supplied
    /// line; `0` disables the check. (Optional: `SMTP_ENGINE_MAX_LINE_LENGTH`, Default: 1000)
    pub max_line_length: usize,

    /// Maximum number of `RCPT TO` recipients accepted per transaction;
    /// `0` disables the cap. (Optional: `SMTP_ENGINE_MAX_RECEIVERS`, Default: 100)
    pub max_receivers: usize,

    /// Auth mechanisms advertised after `EHLO`, in order. An empty list
    /// disables the post-HELO auth gate entirely. (Optional:
    /// `SMTP_ENGINE_AUTH_MECHANISMS`, comma-separated, Default: empty)
    pub supported_auth_mechanisms: Vec<String>,

    /// The URL where the accumulated envelope will be forwarded via POST
    /// request. (Required: `SMTP_ENGINE_WEBHOOK_URL`)
    pub webhook_url: String,

    /// Webhook request timeout in seconds. (Optional: `SMTP_ENGINE_WEBHOOK_TIMEOUT`, Default: 30)
    pub webhook_timeout_secs: u64,

    /// Max retry attempts on webhook delivery failure. (Optional: `SMTP_ENGINE_WEBHOOK_MAX_RETRIES`, Default: 3)
    pub webhook_max_retries: u32,

    /// Consecutive failures required to open the circuit breaker. (Optional: `SMTP_ENGINE_CIRCUIT_BREAKER_THRESHOLD`, Default: 5)
    pub circuit_breaker_threshold: u32,

    /// Seconds before a tripped circuit breaker half-opens. (Optional: `SMTP_ENGINE_CIRCUIT_BREAKER_RESET`, Default: 60)
    pub circuit_breaker_reset_secs: u64,
}

impl Config {
    /// Loads configuration settings from environment variables.
    ///
    /// Reads variables prefixed with `SMTP_ENGINE_`. Supports loading from a `.env` file
    /// if present. Provides default values for bind addresses, ports and limits if not
    /// specified. Logs the configuration values being used.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - `SMTP_ENGINE_WEBHOOK_URL` is missing.
    /// - Any numeric variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        // Attempt to load variables from a .env file, if it exists. Ignore errors.
        let _ = dotenv::dotenv();

        let hostname = env::var("SMTP_ENGINE_HOSTNAME").unwrap_or_else(|_| "smtp-engine".to_string());
        log::info!("Config: Using hostname: {}", hostname);

        let webhook_url = match env::var("SMTP_ENGINE_WEBHOOK_URL") {
            Ok(val) => val,
            Err(e) => {
                let err_msg = "SMTP_ENGINE_WEBHOOK_URL environment variable must be set";
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: Using webhook_url: {}", webhook_url);

        // --- Optional Variables with Defaults ---
        let smtp_bind_address = env::var("SMTP_ENGINE_BIND_ADDRESS")
            .map(|val| {
                log::info!("Config: Using smtp_bind_address from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                let default_val = "0.0.0.0".to_string();
                log::info!("Config: Using default smtp_bind_address: {}", default_val);
                default_val // Default: Listen on all interfaces
            });

        let smtp_port_str = env::var("SMTP_ENGINE_PORT").unwrap_or_else(|_| "2525".to_string());
        let smtp_port = match smtp_port_str.parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                let err_msg = format!(
                    "SMTP_ENGINE_PORT ('{}') must be a valid u16 port number",
                    smtp_port_str
                );
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: Using smtp_port: {}", smtp_port);

        let health_check_bind_address = env::var("SMTP_ENGINE_HEALTH_BIND_ADDRESS")
            .map(|val| {
                log::info!("Config: Using health_check_bind_address from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                let default_val = "0.0.0.0".to_string();
                log::info!(
                    "Config: Using default health_check_bind_address: {}",
                    default_val
                );
                default_val
            });

        let health_check_port_str =
            env::var("SMTP_ENGINE_HEALTH_PORT").unwrap_or_else(|_| "8080".to_string());
        let health_check_port = match health_check_port_str.parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                let err_msg = format!(
                    "SMTP_ENGINE_HEALTH_PORT ('{}') must be a valid u16 port number",
                    health_check_port_str
                );
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: Using health_check_port: {}", health_check_port);

        let max_line_length: usize = env::var("SMTP_ENGINE_MAX_LINE_LENGTH")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|e| anyhow!("SMTP_ENGINE_MAX_LINE_LENGTH must be a valid usize: {}", e))?;
        log::info!("Config: Using max_line_length: {}", max_line_length);

        let max_receivers: usize = env::var("SMTP_ENGINE_MAX_RECEIVERS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|e| anyhow!("SMTP_ENGINE_MAX_RECEIVERS must be a valid usize: {}", e))?;
        log::info!("Config: Using max_receivers: {}", max_receivers);

        let supported_auth_mechanisms: Vec<String> = env::var("SMTP_ENGINE_AUTH_MECHANISMS")
            .map(|val| {
                val.split(',')
                    .map(|mech| mech.trim().to_uppercase())
                    .filter(|mech| !mech.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        log::info!(
            "Config: Using supported_auth_mechanisms: {:?}",
            supported_auth_mechanisms
        );

        // --- Optional: Resilience settings ---
        let webhook_timeout_secs: u64 = env::var("SMTP_ENGINE_WEBHOOK_TIMEOUT")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| anyhow!("SMTP_ENGINE_WEBHOOK_TIMEOUT must be a valid u64: {}", e))?;
        log::info!(
            "Config: Using webhook_timeout_secs: {}",
            webhook_timeout_secs
        );

        let webhook_max_retries: u32 = env::var("SMTP_ENGINE_WEBHOOK_MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|e| anyhow!("SMTP_ENGINE_WEBHOOK_MAX_RETRIES must be a valid u32: {}", e))?;
        log::info!("Config: Using webhook_max_retries: {}", webhook_max_retries);

        let circuit_breaker_threshold: u32 = env::var("SMTP_ENGINE_CIRCUIT_BREAKER_THRESHOLD")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|e| {
                anyhow!(
                    "SMTP_ENGINE_CIRCUIT_BREAKER_THRESHOLD must be a valid u32: {}",
                    e
                )
            })?;
        log::info!(
            "Config: Using circuit_breaker_threshold: {}",
            circuit_breaker_threshold
        );

        let circuit_breaker_reset_secs: u64 = env::var("SMTP_ENGINE_CIRCUIT_BREAKER_RESET")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|e| {
                anyhow!(
                    "SMTP_ENGINE_CIRCUIT_BREAKER_RESET must be a valid u64: {}",
                    e
                )
            })?;
        log::info!(
            "Config: Using circuit_breaker_reset_secs: {}",
            circuit_breaker_reset_secs
        );

        Ok(Config {
            hostname,
            smtp_bind_address,
            smtp_port,
            health_check_bind_address,
            health_check_port,
            max_line_length,
            max_receivers,
            supported_auth_mechanisms,
            webhook_url,
            webhook_timeout_secs,
            webhook_max_retries,
            circuit_breaker_threshold,
            circuit_breaker_reset_secs,
        })
    }
}

// Include the tests defined in tests.rs
mod tests;
