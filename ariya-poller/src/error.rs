use derive_more::{Display, Error, From};
use std::io;
use std::path::PathBuf;

/// Errors from talking to the adapter
///
/// An unreachable adapter is not an error: it is the expected `false` of a
/// probe. Replies that do not decode are not errors either; they simply
/// leave the cached value in place.
#[derive(Debug, Display, Error, From)]
pub enum PollError {
    #[display("invalid adapter endpoint {endpoint}")]
    InvalidEndpoint { endpoint: String },
    #[display("failed to connect to {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[display("I/O error: {_0}")]
    #[from]
    Io(io::Error),
}

/// Errors from loading a configuration file
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[display("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("no adapter host configured")]
    MissingHost,
}
