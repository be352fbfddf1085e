//! Configuration module
//!
//! Environment-driven configuration for the backend: database settings,
//! tracking API endpoint, and the sweep/scheduling knobs.

use std::env;

use crate::poll::MAX_CHECKS;

const MAX_CONNECTIONS: u32 = 20;
const TRACKING_SWEEP_INTERVAL_SECS: u64 = 300;
const AUTOMATION_SWEEP_INTERVAL_SECS: u64 = 60;
const STEP_DELAY_MS: u64 = 1000;

const DEFAULT_TRACKING_API_URL: &str =
    "https://api-labs.wonca.com.br/wonca.labs.v1.LabsService/Track";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Tracking API endpoint. Per-tenant API keys come from the database.
    pub tracking_api_url: String,
    /// Interval between tracking poll sweeps.
    pub tracking_sweep_interval_secs: u64,
    /// Interval between automation dispatch sweeps.
    pub automation_sweep_interval_secs: u64,
    /// Pause between automation steps of one dispatch, to respect rate limits.
    pub step_delay_ms: u64,
    /// Check-count cap beyond which tracking polls throttle to once a day.
    pub max_checks_per_order: i32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            tracking_api_url: env::var("TRACKING_API_URL")
                .unwrap_or_else(|_| DEFAULT_TRACKING_API_URL.to_string()),
            tracking_sweep_interval_secs: env::var("TRACKING_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| TRACKING_SWEEP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(TRACKING_SWEEP_INTERVAL_SECS),
            automation_sweep_interval_secs: env::var("AUTOMATION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| AUTOMATION_SWEEP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(AUTOMATION_SWEEP_INTERVAL_SECS),
            step_delay_ms: env::var("STEP_DELAY_MS")
                .unwrap_or_else(|_| STEP_DELAY_MS.to_string())
                .parse()
                .unwrap_or(STEP_DELAY_MS),
            max_checks_per_order: env::var("MAX_CHECKS_PER_ORDER")
                .unwrap_or_else(|_| MAX_CHECKS.to_string())
                .parse()
                .unwrap_or(MAX_CHECKS),
        })
    }
}
