//! Error types for `rdpbridge`
//!
//! Errors are split by the side of the bridge that produces them: pixel
//! conversion failures degrade a single frame, engine and worker failures
//! end the connection, and configuration errors are reported before a
//! connection is attempted.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Top-level error type for `rdpbridge` operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pixel conversion errors
    #[error("Pixel conversion error: {0}")]
    Pixel(#[from] PixelError),

    /// Connection worker errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration file operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration file
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// The reason for validation failure
        reason: String,
    },

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to write configuration file
    #[error("Failed to write configuration: {0}")]
    Write(String),

    /// Failed to serialize configuration
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

/// Errors produced while translating server pixels into client pixels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelError {
    /// A bit depth outside the supported set
    #[error("Unsupported color depth: {0} bpp")]
    UnsupportedDepth(u8),

    /// Both depths are known but no conversion between them exists
    #[error("No conversion from {from} bpp to {to} bpp")]
    UnsupportedConversion {
        /// Server depth in bits
        from: u8,
        /// Client depth in bits
        to: u8,
    },

    /// Source buffer is smaller than its declared geometry
    #[error("Pixel buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer {
        /// Bytes required by width, height and depth
        expected: usize,
        /// Bytes actually supplied
        actual: usize,
    },

    /// Zero or overflowing image dimensions
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Image width in pixels
        width: u32,
        /// Image height in pixels
        height: u32,
    },

    /// Monochrome mask does not cover the image
    #[error("Mask too short for {width}x{height} image")]
    MaskTooShort {
        /// Image width in pixels
        width: u32,
        /// Image height in pixels
        height: u32,
    },
}

/// Failure reported by a protocol engine or channel manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Human-readable description, relayed to the user on close
    pub message: String,
}

impl EngineError {
    /// Creates an engine error from any message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that terminate the connection worker
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Neither the engine nor the channel manager registered a descriptor
    #[error("No file descriptors registered for the connection")]
    NoDescriptors,

    /// The multiplexed wait itself failed
    #[error("File descriptor wait failed: {0}")]
    Multiplex(#[source] Errno),

    /// The protocol engine reported a failure
    #[error("Protocol engine failure: {0}")]
    Engine(#[source] EngineError),

    /// The channel manager reported a failure
    #[error("Channel manager failure: {0}")]
    Channel(#[source] EngineError),

    /// Creating the wake-up pipe failed
    #[error("Failed to create wake-up pipe: {0}")]
    Pipe(#[source] Errno),

    /// The worker loop panicked, in the engine or in the bridge
    #[error("Connection worker panicked: {0}")]
    Panicked(String),

    /// Spawning the worker thread failed
    #[error("Failed to spawn connection worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type alias for `rdpbridge` operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for pixel conversion
pub type PixelResult<T> = std::result::Result<T, PixelError>;

/// Result type alias for worker operations
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;
