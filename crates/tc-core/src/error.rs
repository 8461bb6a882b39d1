//! Unified error type for the tidecast media engine.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for HTTP handlers to derive a status code via
//! [`Error::http_status`]. The streaming-specific variants matter most:
//! `Unready` is transient and retry-safe, `Aborted` marks a client that went
//! away mid-operation, and `Encoder`/`Resolver` carry the diagnostic text of
//! the external process that failed.

use std::fmt;

/// Unified error type covering all failure modes in tidecast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "source", "segment", "session").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A segment is still being generated and the wait budget ran out.
    ///
    /// Transient: the client may retry the same request.
    #[error("not ready: {0}")]
    Unready(String),

    /// The encoder exited non-zero after any hardware fallback was exhausted.
    #[error("encoder failed [{stage}]: {message}")]
    Encoder {
        /// What was being encoded (segment key, "live", "thumbnail").
        stage: String,
        /// Captured diagnostic text (trailing stderr).
        message: String,
    },

    /// The client disconnected mid-operation; not a server fault.
    #[error("aborted: {0}")]
    Aborted(String),

    /// Source resolution or archive extraction failed; the collaborator's
    /// message (e.g. a wrong-password report) is propagated verbatim.
    #[error("resolver error: {0}")]
    Resolver(String),

    /// Media probing failed.
    #[error("probe error: {0}")]
    Probe(String),

    /// An external tool could not be spawned or exited non-zero.
    #[error("tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A ledger database operation failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    ///
    /// `Aborted` maps to 499 (client closed request); it never reaches the
    /// wire for HTTP requests because the connection is already gone, but
    /// the live channel uses it to pick a close reason.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Unready(_) => 503,
            Error::Encoder { .. } => 502,
            Error::Aborted(_) => 499,
            Error::Resolver(_) => 422,
            Error::Probe(_) => 422,
            Error::Tool { .. } => 502,
            Error::Validation(_) => 400,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Whether a retry of the same request may succeed without any change.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unready(_))
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Encoder`].
    pub fn encoder(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Encoder {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
