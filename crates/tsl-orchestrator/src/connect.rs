//! Best-effort port patching with bounded retry

use serde::Serialize;

use tsl_core::config::RetryConfig;
use tsl_core::error::{GraphError, PortConnectionError};
use tsl_core::traits::AudioGraph;
use tsl_core::types::ConnectionSpec;

use crate::backoff::ExponentialBackoff;

/// Outcome of patching a list of connections
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionReport {
    /// Connections that were made
    pub connected: Vec<String>,
    /// Connections that could not be made
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<PortConnectionError>,
}

impl ConnectionReport {
    /// Number of connections attempted
    pub fn attempted(&self) -> usize {
        self.connected.len() + self.failed.len()
    }

    /// Whether every connection was made
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_failures<S>(failed: &[PortConnectionError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(failed.iter().map(|f| f.to_string()))
}

/// Connect one spec, retrying with backoff
///
/// Returns the attempt number that succeeded. A missing graph tool fails
/// immediately since retrying cannot help.
pub async fn connect_with_retry(
    graph: &dyn AudioGraph,
    spec: &ConnectionSpec,
    retry: &RetryConfig,
) -> Result<u32, PortConnectionError> {
    let attempts = retry.attempts.max(1);
    let mut backoff = ExponentialBackoff::from_config(&retry.backoff);
    let mut reason = String::new();

    for attempt in 1..=attempts {
        match graph.connect(&spec.source, &spec.destination).await {
            Ok(()) => {
                tracing::info!("Connected {} (attempt {})", spec, attempt);
                return Ok(attempt);
            }
            Err(e @ GraphError::ToolNotFound(_)) => {
                return Err(PortConnectionError {
                    spec: spec.clone(),
                    attempts: attempt,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                reason = e.to_string();
                if attempt < attempts {
                    let delay = backoff.next_delay();
                    tracing::debug!(
                        "Connecting {} failed ({}), retrying in {:?}",
                        spec,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(PortConnectionError {
        spec: spec.clone(),
        attempts,
        reason,
    })
}

/// Connect every spec in order, isolating failures
///
/// `precheck` may veto a spec before it is attempted (for instance when
/// the process owning one of its ports has died); a vetoed spec is
/// reported with zero attempts. A failed spec never stops later ones.
pub async fn connect_all<F>(
    graph: &dyn AudioGraph,
    specs: &[ConnectionSpec],
    retry: &RetryConfig,
    mut precheck: F,
) -> ConnectionReport
where
    F: FnMut(&ConnectionSpec) -> Result<(), String>,
{
    let mut report = ConnectionReport::default();

    for spec in specs {
        if let Err(reason) = precheck(spec) {
            tracing::warn!("Skipping {}: {}", spec, reason);
            report.failed.push(PortConnectionError {
                spec: spec.clone(),
                attempts: 0,
                reason,
            });
            continue;
        }

        match connect_with_retry(graph, spec, retry).await {
            Ok(_) => report.connected.push(spec.to_string()),
            Err(e) => {
                tracing::warn!("{}", e);
                report.failed.push(e);
            }
        }
    }

    report
}
