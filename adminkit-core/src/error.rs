//! Unified error handling system
//!
//! Every failure the console state layer reports is one of these variants. The
//! message carried by `Auth`, `Fetch` and `Mutation` is exactly the text the status
//! beacon surfaces to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }
}

/// Main error type for adminkit
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Login or logout failure
    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        context: ErrorContext,
    },

    /// Role, assignment or module retrieval failure
    #[error("Fetch error: {message}")]
    Fetch {
        message: String,
        context: ErrorContext,
    },

    /// Install, uninstall or upgrade failure
    #[error("Mutation error: {message}")]
    Mutation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConsoleError {
    pub fn auth(message: impl Into<String>, component: &str, operation: &str) -> Self {
        Self::Auth {
            message: message.into(),
            context: ErrorContext::new(component).with_operation(operation),
        }
    }

    pub fn fetch(message: impl Into<String>, component: &str, operation: &str) -> Self {
        Self::Fetch {
            message: message.into(),
            context: ErrorContext::new(component).with_operation(operation),
        }
    }

    pub fn mutation(message: impl Into<String>, component: &str, operation: &str) -> Self {
        Self::Mutation {
            message: message.into(),
            context: ErrorContext::new(component).with_operation(operation),
        }
    }

    pub fn storage(
        message: impl Into<String>,
        operation: &str,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source,
            context: ErrorContext::new("storage").with_operation(operation),
        }
    }

    /// Attach a metadata entry to the error context, when the variant carries one
    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        if let Some(context) = self.context_mut() {
            context.metadata.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// The human-readable message surfaced to the user
    pub fn message(&self) -> String {
        match self {
            ConsoleError::Auth { message, .. }
            | ConsoleError::Fetch { message, .. }
            | ConsoleError::Mutation { message, .. }
            | ConsoleError::Config { message, .. }
            | ConsoleError::Storage { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ConsoleError::Auth { context, .. } => Some(context),
            ConsoleError::Fetch { context, .. } => Some(context),
            ConsoleError::Mutation { context, .. } => Some(context),
            ConsoleError::Config { context, .. } => Some(context),
            ConsoleError::Storage { context, .. } => Some(context),
            _ => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            ConsoleError::Auth { context, .. }
            | ConsoleError::Fetch { context, .. }
            | ConsoleError::Mutation { context, .. }
            | ConsoleError::Config { context, .. }
            | ConsoleError::Storage { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Operation failures leave the console in a retriable state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConsoleError::Auth { .. } | ConsoleError::Fetch { .. } | ConsoleError::Mutation { .. }
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        let operation = self.context().and_then(|c| c.operation.as_deref());
        match self {
            ConsoleError::Config { .. } | ConsoleError::Storage { .. } => {
                error!(error_id = ?error_id, operation = ?operation, error = %self, "Configuration or storage error");
            }
            _ => {
                warn!(error_id = ?error_id, operation = ?operation, error = %self, "Operation failed");
            }
        }
    }
}

/// Convenience macro for configuration errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $operation:expr) => {
        $crate::ConsoleError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new("config").with_operation($operation),
        }
    };
    ($msg:expr, $operation:expr, $source:expr) => {
        $crate::ConsoleError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new("config").with_operation($operation),
        }
    };
}

/// Failure reported by a [`crate::ConsoleApi`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-success status
    #[error("backend returned {status}: {}", .messages.as_deref().unwrap_or("no message"))]
    Backend {
        status: u16,
        messages: Option<String>,
    },

    /// The request never produced a response
    #[error("network failure: {0}")]
    Network(String),

    /// The response body could not be interpreted
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn backend(status: u16, messages: impl Into<String>) -> Self {
        Self::Backend {
            status,
            messages: Some(messages.into()),
        }
    }

    /// Backend-supplied message, if the server sent a non-empty one
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Backend {
                messages: Some(m), ..
            } if !m.trim().is_empty() => Some(m.as_str()),
            _ => None,
        }
    }

    /// Message to surface: the backend's when present, otherwise `fallback`
    pub fn message_or(&self, fallback: &str) -> String {
        self.backend_message().unwrap_or(fallback).to_string()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
