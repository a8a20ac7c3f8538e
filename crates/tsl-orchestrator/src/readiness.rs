//! Bounded polling for port readiness
//!
//! Processes register their ports some time after they start. Rather than
//! sleeping for a fixed delay, the launcher lists the graph's ports at a
//! fixed interval until every orchestrated client has shown up or a
//! timeout runs out. The timeout also bounds each listing, so a wedged
//! graph tool cannot hold startup up.

use std::time::Duration;

use tokio::time::{sleep, timeout as with_timeout, Instant};

use tsl_core::error::{GraphError, StartupError};
use tsl_core::traits::AudioGraph;

/// What must be registered before the graph counts as ready
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadinessTarget {
    /// Full `client:port` names that must exist
    pub ports: Vec<String>,
    /// Clients that must have registered at least one port
    pub clients: Vec<String>,
}

impl ReadinessTarget {
    /// Everything still absent from `available`: ports first, then clients
    pub fn missing(&self, available: &[String]) -> Vec<String> {
        let ports = self
            .ports
            .iter()
            .filter(|port| !available.contains(port))
            .cloned();
        let clients = self
            .clients
            .iter()
            .filter(|client| !available.iter().any(|port| owned_by(port, client)))
            .cloned();
        ports.chain(clients).collect()
    }

    /// Everything in the target
    pub fn all(&self) -> Vec<String> {
        self.ports.iter().chain(&self.clients).cloned().collect()
    }
}

fn owned_by(port: &str, client: &str) -> bool {
    port.split_once(':')
        .map(|(owner, _)| owner == client)
        .unwrap_or(false)
}

/// Poll `graph` until everything in `target` is registered
///
/// `liveness` runs before every poll so a dead process aborts the wait
/// instead of running out the timeout. A graph that cannot be queried yet
/// (server still starting) counts as not ready; a missing graph tool is
/// fatal. The last poll happens at the deadline. Returns the number of
/// polls made.
pub async fn wait_for_ports<F>(
    graph: &dyn AudioGraph,
    target: &ReadinessTarget,
    timeout: Duration,
    poll_interval: Duration,
    mut liveness: F,
) -> Result<usize, StartupError>
where
    F: FnMut() -> Result<(), StartupError>,
{
    let deadline = Instant::now() + timeout;
    let mut missing = target.all();
    let mut polls = 0;

    loop {
        liveness()?;
        polls += 1;

        let remaining = deadline.saturating_duration_since(Instant::now());
        match with_timeout(remaining, graph.list_ports()).await {
            Ok(Ok(ports)) => {
                missing = target.missing(&ports);
                if missing.is_empty() {
                    tracing::info!("Audio graph ready after {} poll(s)", polls);
                    return Ok(polls);
                }
                tracing::debug!("Waiting for: {}", missing.join(", "));
            }
            Ok(Err(GraphError::ToolNotFound(tool))) => {
                return Err(GraphError::ToolNotFound(tool).into());
            }
            Ok(Err(e)) => {
                tracing::debug!("Audio graph not answering yet: {}", e);
            }
            Err(_) => {
                tracing::warn!("Listing ports did not finish before the readiness deadline");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(StartupError::ReadinessTimeout { timeout, missing });
        }
        sleep(poll_interval.min(remaining)).await;
    }
}
