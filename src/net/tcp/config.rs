use std::{fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::codec::{Encode, FrameLimits, WireInt, DEFAULT_MAX_STRING_LEN};
use crate::error::Result;
use crate::net::errors::NetworkError;
use crate::net::tcp::traits::{Logger, TracingLogger};
use crate::reactor::{DEFAULT_EVENTS_CAPACITY, DEFAULT_POLL_TIMEOUT_MS};

pub const DEFAULT_BUFFER_SIZE: usize = buffer_size_for(DEFAULT_MAX_STRING_LEN);

/// Buffer capacity that holds a two-string frame with both strings at
/// `max_string_len`.
pub const fn buffer_size_for(max_string_len: usize) -> usize {
    2 * (<i32 as WireInt>::WIDTH + max_string_len)
}

/// Configuration for the TCP server.
///
/// Controls the bind address, per-connection buffer sizes, frame limits,
/// connection limits and socket options. Use `ServerConfig::builder()` for
/// ergonomic construction, or load a [`ServerSettings`] file and apply it.
///
/// ## Buffers and limits
///
/// - buffer_size: capacity of each connection's inbound and outbound buffer.
///   An outbound message larger than this can never be sent. Unless set
///   explicitly it follows `max_string_len` through [`buffer_size_for`].
/// - max_string_len: largest string length a peer may declare before the
///   frame is rejected as malformed.
///
/// ## Timers
///
/// - poll_timeout: upper bound on one blocking wait; also the reaper's
///   resolution.
/// - idle_timeout: connections without any I/O for this long are closed.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub address: SocketAddr,
    /// Capacity of each inbound and outbound buffer
    pub buffer_size: usize,
    /// Largest accepted string payload
    pub max_string_len: usize,
    /// Maximum number of connections
    pub max_connections: Option<usize>,
    /// Enable TCP_NODELAY
    pub no_delay: bool,
    /// Close connections idle for longer than this
    pub idle_timeout: Option<Duration>,
    /// Upper bound on a single poll
    pub poll_timeout: Option<Duration>,
    /// Events drained per poll
    pub events_capacity: usize,
    /// Logger for network events
    pub logger: Arc<dyn Logger>,
}

impl ServerConfig {
    /// Create a new builder for ServerConfig
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    pub fn limits(&self) -> FrameLimits {
        FrameLimits::new(self.max_string_len)
    }

    /// Rejects combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < std::mem::size_of::<i32>() {
            return Err(NetworkError::Configuration(format!(
                "buffer_size {} cannot hold a length prefix",
                self.buffer_size
            )));
        }
        if self.buffer_size > i32::MAX as usize {
            return Err(NetworkError::Configuration(format!(
                "buffer_size {} exceeds the i32 length prefix",
                self.buffer_size
            )));
        }
        if self.max_string_len > i32::MAX as usize {
            return Err(NetworkError::Configuration(format!(
                "max_string_len {} exceeds the i32 length prefix",
                self.max_string_len
            )));
        }
        if self.events_capacity == 0 {
            return Err(NetworkError::Configuration(
                "events_capacity must be positive".into(),
            ));
        }
        if self.max_connections == Some(0) {
            return Err(NetworkError::Configuration(
                "max_connections must be positive".into(),
            ));
        }
        Ok(())
    }

    /// [`validate`](Self::validate), and also rejects a `buffer_size` that
    /// cannot hold the largest `T` a peer could be sent under the configured
    /// limits.
    pub fn validate_for<T: Encode>(&self) -> Result<()> {
        self.validate()?;
        if let Some(largest) = T::max_encoded_len(&self.limits()) {
            if largest > self.buffer_size {
                return Err(NetworkError::Configuration(format!(
                    "buffer_size {} cannot hold a {largest}-byte frame at max_string_len {}",
                    self.buffer_size, self.max_string_len
                )));
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 7777)),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_connections: None,
            no_delay: true,
            idle_timeout: None,
            poll_timeout: Some(Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS)),
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            logger: Arc::new(TracingLogger),
        }
    }
}

/// Builder for ServerConfig using the builder pattern.
///
/// All fields are optional and will use defaults from ServerConfig::default()
/// if not explicitly set.
#[derive(Default)]
pub struct ServerConfigBuilder {
    address: Option<SocketAddr>,
    buffer_size: Option<usize>,
    max_string_len: Option<usize>,
    max_connections: Option<usize>,
    no_delay: Option<bool>,
    idle_timeout: Option<Option<Duration>>,
    poll_timeout: Option<Option<Duration>>,
    events_capacity: Option<usize>,
    logger: Option<Arc<dyn Logger>>,
}

impl ServerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address to bind to
    pub fn address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Bind on all interfaces at `port`
    pub fn port(mut self, port: u16) -> Self {
        self.address = Some(SocketAddr::from(([0, 0, 0, 0], port)));
        self
    }

    /// Set the inbound/outbound buffer capacity
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Set the largest accepted string length
    pub fn max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = Some(len);
        self
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = Some(enabled);
        self
    }

    /// Close connections after this much inactivity
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the poll timeout, `None` to block until readiness
    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Set the number of events drained per poll
    pub fn events_capacity(mut self, capacity: usize) -> Self {
        self.events_capacity = Some(capacity);
        self
    }

    /// Set the logger implementation
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Apply every value present in `settings`
    pub fn settings(mut self, settings: &ServerSettings) -> Self {
        if let Some(address) = settings.address {
            self.address = Some(address);
        }
        if let Some(size) = settings.buffer_size {
            self.buffer_size = Some(size);
        }
        if let Some(len) = settings.max_string_len {
            self.max_string_len = Some(len);
        }
        if let Some(max) = settings.max_connections {
            self.max_connections = Some(max);
        }
        if let Some(enabled) = settings.no_delay {
            self.no_delay = Some(enabled);
        }
        if let Some(ms) = settings.idle_timeout_ms {
            self.idle_timeout = Some(Some(Duration::from_millis(ms)));
        }
        if let Some(ms) = settings.poll_timeout_ms {
            self.poll_timeout = Some(Some(Duration::from_millis(ms)));
        }
        if let Some(capacity) = settings.events_capacity {
            self.events_capacity = Some(capacity);
        }
        self
    }

    /// Build the ServerConfig
    pub fn build(self) -> ServerConfig {
        let default = ServerConfig::default();
        let max_string_len = self.max_string_len.unwrap_or(default.max_string_len);
        ServerConfig {
            address: self.address.unwrap_or(default.address),
            buffer_size: self
                .buffer_size
                .unwrap_or_else(|| buffer_size_for(max_string_len)),
            max_string_len,
            max_connections: self.max_connections.or(default.max_connections),
            no_delay: self.no_delay.unwrap_or(default.no_delay),
            idle_timeout: self.idle_timeout.unwrap_or(default.idle_timeout),
            poll_timeout: self.poll_timeout.unwrap_or(default.poll_timeout),
            events_capacity: self.events_capacity.unwrap_or(default.events_capacity),
            logger: self.logger.unwrap_or(default.logger),
        }
    }
}

/// File-backed subset of [`ServerConfig`], read from JSON.
///
/// ```json
/// { "address": "0.0.0.0:7777", "max_string_len": 1020, "idle_timeout_ms": 30000 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub address: Option<SocketAddr>,
    pub buffer_size: Option<usize>,
    pub max_string_len: Option<usize>,
    pub max_connections: Option<usize>,
    pub no_delay: Option<bool>,
    pub idle_timeout_ms: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
    pub events_capacity: Option<usize>,
}

impl ServerSettings {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| NetworkError::Configuration(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            NetworkError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }
}

/// Configuration for [`TcpClient`](crate::net::tcp::client::TcpClient).
#[derive(Clone)]
pub struct ClientConfig {
    pub address: SocketAddr,
    pub buffer_size: usize,
    pub max_string_len: usize,
    pub poll_timeout: Option<Duration>,
    pub logger: Arc<dyn Logger>,
}

impl ClientConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            buffer_size: 10_000,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            poll_timeout: Some(Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS)),
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn limits(&self) -> FrameLimits {
        FrameLimits::new(self.max_string_len)
    }

    /// Rejects a `buffer_size` that cannot hold the largest `T` this client
    /// could send.
    pub fn validate_for<T: Encode>(&self) -> Result<()> {
        match T::max_encoded_len(&self.limits()) {
            Some(largest) if largest > self.buffer_size => Err(NetworkError::Configuration(
                format!(
                    "buffer_size {} cannot hold a {largest}-byte frame",
                    self.buffer_size
                ),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tcp::traits::NoOpLogger;

    #[test]
    fn test_builder_defaults() {
        let config = ServerConfig::builder().build();
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.max_string_len, 1020);
        assert!(config.no_delay);
        assert!(config.idle_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder()
            .port(9000)
            .buffer_size(64)
            .max_string_len(32)
            .max_connections(3)
            .idle_timeout(Some(Duration::from_secs(5)))
            .logger(Arc::new(NoOpLogger))
            .build();
        assert_eq!(config.address.port(), 9000);
        assert_eq!(config.limits(), FrameLimits::new(32));
        assert_eq!(config.max_connections, Some(3));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_settings_from_json() {
        let settings = ServerSettings::from_json(
            r#"{ "address": "127.0.0.1:4000", "max_string_len": 100, "idle_timeout_ms": 250 }"#,
        )
        .unwrap();
        let config = ServerConfig::builder().settings(&settings).build();
        assert_eq!(config.address, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.max_string_len, 100);
        assert_eq!(config.idle_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.buffer_size, buffer_size_for(100));
    }

    #[test]
    fn test_settings_reject_unknown_keys() {
        let err = ServerSettings::from_json(r#"{ "bufer_size": 10 }"#).unwrap_err();
        assert!(matches!(err, NetworkError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_tiny_buffer() {
        let config = ServerConfig::builder().buffer_size(2).build();
        assert!(matches!(
            config.validate(),
            Err(NetworkError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_for_checks_the_largest_frame() {
        use crate::codec::Message;

        let config = ServerConfig::builder().build();
        assert!(config.validate_for::<Message>().is_ok());

        let config = ServerConfig::builder().max_string_len(4000).build();
        assert_eq!(config.buffer_size, 8008);
        assert!(config.validate_for::<Message>().is_ok());

        let config = ServerConfig::builder().buffer_size(1024).build();
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_for::<Message>(),
            Err(NetworkError::Configuration(_))
        ));
        assert!(config.validate_for::<(i32, i32)>().is_ok());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_validate_rejects_buffer_beyond_length_prefix() {
        let config = ServerConfig::builder()
            .buffer_size(i32::MAX as usize + 1)
            .build();
        assert!(matches!(
            config.validate(),
            Err(NetworkError::Configuration(_))
        ));
    }
}
