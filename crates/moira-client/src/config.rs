//! Configuration types for Moira client usage.

use crate::Result;
use moira_core::status::{
    DEFAULT_CLIENT_IDENTITY, DEFAULT_QUERY_VERSION, MAX_LIST_DEPTH, MOIRA_PORT,
};
use moira_core::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default cap on inclusion pathways reported by the tracer.
pub const DEFAULT_MAX_PATHWAYS: usize = 65_536;

/// Configuration for connecting to a Moira server.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    /// Server hostname
    #[validate(length(min = 1))]
    host: String,

    #[serde(default = "default_port")]
    port: u16,

    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    connection_timeout_secs: u64,

    #[serde(default = "default_query_version")]
    query_version: u32,

    #[validate(length(min = 1))]
    #[serde(default = "default_client_identity")]
    client_identity: String,

    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_max_depth")]
    max_depth: usize,

    #[validate(range(min = 1))]
    #[serde(default = "default_max_pathways")]
    max_pathways: usize,
}

const fn default_port() -> u16 {
    MOIRA_PORT
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_query_version() -> u32 {
    DEFAULT_QUERY_VERSION
}

fn default_client_identity() -> String {
    DEFAULT_CLIENT_IDENTITY.to_string()
}

const fn default_max_depth() -> usize {
    MAX_LIST_DEPTH
}

const fn default_max_pathways() -> usize {
    DEFAULT_MAX_PATHWAYS
}

impl ClientConfig {
    /// Creates a new client configuration for the given host.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let config = Self {
            host: host.into(),
            port: default_port(),
            connection_timeout_secs: default_connection_timeout_secs(),
            query_version: default_query_version(),
            client_identity: default_client_identity(),
            max_depth: default_max_depth(),
            max_pathways: default_max_pathways(),
        };
        config.check()?;
        Ok(config)
    }

    /// Re-validates the configuration, e.g. after deserializing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
    }

    /// Returns the server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the `host:port` address to connect to.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Query version negotiated right after connecting.
    #[must_use]
    pub const fn query_version(&self) -> u32 {
        self.query_version
    }

    /// Identity string sent with authentication requests.
    #[must_use]
    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    /// Maximum number of expansion waves for client-side list expansion.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Maximum number of pathways the tracer reports.
    #[must_use]
    pub const fn max_pathways(&self) -> usize {
        self.max_pathways
    }

    /// Overrides the server port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the initial query version.
    #[must_use]
    pub const fn with_query_version(mut self, version: u32) -> Self {
        self.query_version = version;
        self
    }

    /// Overrides the client identity string.
    #[must_use]
    pub fn with_client_identity(mut self, identity: impl Into<String>) -> Self {
        self.client_identity = identity.into();
        self
    }

    /// Overrides the expansion depth ceiling.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Overrides the tracer pathway cap.
    #[must_use]
    pub const fn with_max_pathways(mut self, pathways: usize) -> Self {
        self.max_pathways = pathways;
        self
    }
}
