//! Audio graph trait

use async_trait::async_trait;

use crate::error::GraphError;
use crate::types::PortEndpoint;

/// Abstraction over the running audio server's port graph
///
/// The production implementation shells out to the JACK command-line
/// tools; tests substitute an in-memory graph.
#[async_trait]
pub trait AudioGraph: Send + Sync {
    /// Full names (`<client>:<port>`) of every registered port
    async fn list_ports(&self) -> Result<Vec<String>, GraphError>;

    /// Patch `source` into `destination`
    async fn connect(
        &self,
        source: &PortEndpoint,
        destination: &PortEndpoint,
    ) -> Result<(), GraphError>;

    /// Set the server-wide block size in frames
    async fn set_buffer_size(&self, frames: u32) -> Result<(), GraphError>;
}
