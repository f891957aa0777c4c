//! Beacon: Collector Protocol Client
//!
//! The communications layer between an embedded instrumentation agent and
//! the remote telemetry collector. Registers the monitored process,
//! obtains a per-run session, and submits metric, error, trace and SQL
//! trace batches, classifying every collector response into a control
//! outcome the harvest loop acts on.

pub mod classify;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod register;
pub mod session;
pub mod transport;

pub use classify::Outcome;
pub use config::AgentConfig;
pub use register::{create_session, Environment};
pub use session::Session;
pub use transport::{CollectorTransport, HttpTransport};
