//! tsl-orchestrator: brings up the touchscreen instrument's audio stack
//!
//! Launches the audio server and the instrument application, polls the
//! audio graph until their ports are registered, patches the configured
//! connections and applies the buffer size. The same orchestrator tears
//! everything down again on shutdown.

pub mod backoff;
pub mod connect;
pub mod graph;
pub mod orchestrator;
pub mod process;
pub mod readiness;

pub use connect::ConnectionReport;
pub use graph::JackTools;
pub use orchestrator::{BufferSizeOutcome, ShutdownReason, StartupOrchestrator, StartupReport};
pub use process::{ProcessHandle, ProcessSpec};
pub use readiness::ReadinessTarget;
