//! Application configuration loaded from environment variables.
//!
//! Every setting has a default tuned for a phone GPS receiver, so an
//! empty environment yields a working configuration.

use crate::units::UnitSystem;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default interval between position requests.
pub const DEFAULT_LOCATION_INTERVAL_MS: u64 = 1000;
/// Missed fixes tolerated before GPS is reported inactive.
pub const DEFAULT_ALLOWED_FIX_MISSES: u32 = 8;
/// Fixes less accurate than this are dropped.
pub const DEFAULT_ACCURACY_THRESHOLD_M: f32 = 20.0;
/// Fixes discarded after each (re)start while GPS stabilizes.
pub const DEFAULT_WARMUP_FIX_COUNT: u32 = 7;
/// Speeds below this are reported as 0 (GPS jitter while standing still).
pub const DEFAULT_MIN_SPEED_KMH: f64 = 2.2;

/// Location tracker tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
    /// Requested interval between fixes
    pub interval: Duration,
    /// Missed intervals before GPS is considered inactive
    pub allowed_misses: u32,
    /// Fixes with an accuracy radius above this are rejected (meters)
    pub accuracy_threshold_m: f32,
    /// Fixes ignored after each location session start
    pub warmup_fix_count: u32,
}

impl LocationConfig {
    /// Silence after the last fix before GPS is reported inactive.
    pub fn inactivity_timeout(&self) -> Duration {
        self.interval * self.allowed_misses
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_LOCATION_INTERVAL_MS),
            allowed_misses: DEFAULT_ALLOWED_FIX_MISSES,
            accuracy_threshold_m: DEFAULT_ACCURACY_THRESHOLD_M,
            warmup_fix_count: DEFAULT_WARMUP_FIX_COUNT,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Units used for formatted values
    pub units: UnitSystem,
    pub location: LocationConfig,
    /// Speed floor for moving/not-moving decisions (m/s)
    pub min_speed_m_s: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            units: UnitSystem::Metric,
            location: LocationConfig::default(),
            min_speed_m_s: DEFAULT_MIN_SPEED_KMH / 3.6,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();
        let interval_ms = parse_var("LOCATION_INTERVAL_MS", DEFAULT_LOCATION_INTERVAL_MS)?;
        let min_speed_kmh = parse_var("MIN_SPEED_KMH", DEFAULT_MIN_SPEED_KMH)?;

        Ok(Self {
            port: parse_var("PORT", defaults.port)?,
            units: parse_var("UNITS", defaults.units)?,
            location: LocationConfig {
                interval: Duration::from_millis(interval_ms),
                allowed_misses: parse_var("ALLOWED_FIX_MISSES", DEFAULT_ALLOWED_FIX_MISSES)?,
                accuracy_threshold_m: parse_var(
                    "ACCURACY_THRESHOLD_M",
                    DEFAULT_ACCURACY_THRESHOLD_M,
                )?,
                warmup_fix_count: parse_var("WARMUP_FIX_COUNT", DEFAULT_WARMUP_FIX_COUNT)?,
            },
            min_speed_m_s: min_speed_kmh / 3.6,
        })
    }
}

/// Read `var`, falling back to `default` when unset.
fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}
