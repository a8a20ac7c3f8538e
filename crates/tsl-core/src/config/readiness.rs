//! Readiness polling and retry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;

/// How to wait for processes to register their ports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Give up waiting for ports after this long
    #[serde(with = "duration_millis")]
    pub timeout: Duration,

    /// Delay between port listings
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// How long a freshly spawned process must survive to count as launched
    #[serde(with = "duration_millis")]
    pub launch_grace: Duration,

    /// Extra ports that must exist before connecting, on top of every
    /// orchestrated process having registered at least one port
    pub ports: Vec<String>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(200),
            launch_grace: Duration::from_millis(300),
            ports: Vec::new(),
        }
    }
}

/// Bounded retry for individual port connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per connection, including the first
    pub attempts: u32,

    /// Delay schedule between attempts
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
