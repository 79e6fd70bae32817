//! Error types for lead intake.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store and persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored record exists but cannot be decoded.
    #[error("Corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to send message to {to}: {reason}")]
    SendFailed { to: String, reason: String },

    /// The provider refused the message; resending it will not help.
    #[error("Message to {to} rejected with HTTP {status}: {reason}")]
    Rejected {
        to: String,
        status: u16,
        reason: String,
    },

    #[error("Delivery queue is closed")]
    QueueClosed,

    #[error("Invalid outbound message: {0}")]
    InvalidMessage(String),
}

impl DeliveryError {
    /// Whether a retry could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SendFailed { .. })
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
