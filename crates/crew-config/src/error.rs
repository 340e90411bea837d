//! Configuration error types.

/// Errors that can occur when loading, saving, or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// The selected endpoint name has no entry in `network.endpoints`.
    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    /// The endpoint host does not parse as an IP address.
    #[error("invalid address '{address}' for endpoint '{endpoint}'")]
    InvalidAddress {
        /// Endpoint name.
        endpoint: String,
        /// Offending address text.
        address: String,
    },
}
