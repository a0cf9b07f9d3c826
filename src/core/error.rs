//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Socket write to a remote collector failed
    #[error("Network write to '{target}' failed")]
    NetworkWrite {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Handler already closed
    #[error("Handler '{handler}' is closed")]
    HandlerClosed { handler: String },

    /// Handler panicked while processing an entry
    #[error("Handler '{handler}' panicked: {message}")]
    HandlerPanicked { handler: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a network write error
    pub fn network_write(target: impl Into<String>, source: std::io::Error) -> Self {
        LoggerError::NetworkWrite {
            target: target.into(),
            source,
        }
    }

    /// Create a handler closed error
    pub fn handler_closed(handler: impl Into<String>) -> Self {
        LoggerError::HandlerClosed {
            handler: handler.into(),
        }
    }

    pub fn handler_panicked(handler: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::HandlerPanicked {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}
