//! Polls a Nissan Ariya's 12V battery, traction battery SOC and HV pack
//! voltage through an ELM327 WiFi adapter.
//!
//! `PollingEngine::refresh` runs one cycle and always returns a snapshot;
//! `spawn_poller` runs cycles on a worker thread at a fixed interval and on
//! demand.

pub mod config;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod scheduler;
pub mod snapshot;
pub mod transport;

pub use config::{Config, LogLevel, Timing};
pub use engine::{
    Clock, CycleOutcome, ForceRefreshHandle, PollingEngine, SystemClock,
    FULL_READ_VOLTAGE_THRESHOLD, UNREACHABLE_FORCE_AFTER,
};
pub use error::{ConfigError, PollError};
pub use scheduler::{spawn_poller, PollerHandle};
pub use snapshot::{Metric, MetricSnapshot};
pub use transport::{AdapterConnection, Endpoint, TcpConnection, TcpTransport, Transport};
