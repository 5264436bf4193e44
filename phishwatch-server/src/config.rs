//! Configuration module

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::alerts::WebhookPlatform;
use crate::classifier::simulated::DEFAULT_PROMOTION_PROBABILITY;
use crate::classifier::{SimulatedClassifier, Verdict};
use crate::monitor::policy::{DEFAULT_HORIZON_UNITS, DEFAULT_UNITS_PER_TICK};
use crate::monitor::scheduler::DEFAULT_TICK_INTERVAL;
use crate::monitor::{MonitorResult, MonitoringPolicy, DEFAULT_CLASSIFICATION_TIMEOUT};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,

    /// Time between monitor ticks
    pub tick_interval: Duration,

    pub monitoring_horizon_units: f64,
    pub units_per_tick: f64,
    pub recheck_every_ticks: u64,

    /// Upper bound on a single classifier call
    pub classification_timeout: Duration,

    /// Classification service base URL; simulated classifier when unset
    pub classifier_url: Option<String>,

    pub simulated_promotion_probability: f64,
    pub simulated_seed: Option<u64>,
    /// Fixed initial verdict instead of the domain keyword rules
    pub simulated_verdict: Option<Verdict>,

    pub alert_webhook_url: Option<String>,
    pub alert_webhook_platform: WebhookPlatform,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://phishwatch.db".to_string()),

            port: parse_var("PORT").unwrap_or(8080),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            log_format: env::var("LOG_FORMAT")
                .map(|f| LogFormat::from_str(&f))
                .unwrap_or(LogFormat::Pretty),

            tick_interval: parse_var("TICK_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TICK_INTERVAL),

            monitoring_horizon_units: parse_var("MONITORING_HORIZON_UNITS")
                .unwrap_or(DEFAULT_HORIZON_UNITS),

            units_per_tick: parse_var("UNITS_PER_TICK").unwrap_or(DEFAULT_UNITS_PER_TICK),

            recheck_every_ticks: parse_var("RECHECK_EVERY_TICKS").unwrap_or(1),

            classification_timeout: parse_var("CLASSIFICATION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CLASSIFICATION_TIMEOUT),

            classifier_url: non_empty_var("CLASSIFIER_URL"),

            simulated_promotion_probability: parse_var("SIMULATED_PROMOTION_PROBABILITY")
                .unwrap_or(DEFAULT_PROMOTION_PROBABILITY),

            simulated_seed: parse_var("SIMULATED_SEED"),

            simulated_verdict: env::var("SIMULATED_VERDICT")
                .ok()
                .and_then(|v| Verdict::parse(&v)),

            alert_webhook_url: non_empty_var("ALERT_WEBHOOK_URL"),

            alert_webhook_platform: env::var("ALERT_WEBHOOK_PLATFORM")
                .map(|p| WebhookPlatform::parse(&p))
                .unwrap_or(WebhookPlatform::Generic),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validated monitoring knobs
    pub fn monitoring_policy(&self) -> MonitorResult<MonitoringPolicy> {
        MonitoringPolicy::new(
            self.monitoring_horizon_units,
            self.units_per_tick,
            self.recheck_every_ticks,
        )
    }

    /// Simulated classifier built from the `SIMULATED_*` knobs
    pub fn simulated_classifier(&self) -> MonitorResult<SimulatedClassifier> {
        let classifier = SimulatedClassifier::new(self.simulated_promotion_probability, self.simulated_seed)?;

        Ok(match self.simulated_verdict {
            Some(verdict) => classifier.with_verdict(verdict),
            None => classifier,
        })
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
