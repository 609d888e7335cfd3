//! Wire protocol configuration

use crate::header::MESSAGE_VERSION;

/// Limits applied by the connection handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireConfig {
    /// Largest accepted request body in bytes
    ///
    /// A larger declared body closes the connection.
    pub max_body_length: u32,

    /// Protocol version accepted in request headers
    pub supported_version: u8,
}

impl Default for WireConfig {
    fn default() -> Self {
        WireConfig {
            max_body_length: 8 * 1024 * 1024,
            supported_version: MESSAGE_VERSION,
        }
    }
}

impl WireConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest accepted request body.
    pub fn with_max_body_length(mut self, bytes: u32) -> Self {
        self.max_body_length = bytes;
        self
    }

    /// Set the accepted protocol version.
    pub fn with_supported_version(mut self, version: u8) -> Self {
        self.supported_version = version;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), WireConfigError> {
        if self.max_body_length == 0 {
            return Err(WireConfigError::ZeroBodyLength);
        }
        if self.supported_version == 0 {
            return Err(WireConfigError::InvalidVersion);
        }
        Ok(())
    }

    /// Create a configuration with small limits for tests.
    pub fn for_testing() -> Self {
        WireConfig {
            max_body_length: 64 * 1024,
            supported_version: MESSAGE_VERSION,
        }
    }
}

/// Wire configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireConfigError {
    /// No body could ever be accepted.
    #[error("Maximum body length must be greater than zero")]
    ZeroBodyLength,

    /// Version 0 is never sent by clients.
    #[error("Supported version must be greater than zero")]
    InvalidVersion,
}
