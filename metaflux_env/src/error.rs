//! Error types for the MetaFlux environment abstraction.

use thiserror::Error;

/// Failures that can occur while talking to the simulation service.
///
/// The variants map onto three categories: network (connection problems and
/// timeouts), server (a non-success answer with a detail message) and
/// malformed (a body that does not have the expected shape).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    /// Connection refused, reset, DNS failure, body read failure
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Attempt exceeded its time budget
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Service answered with a failure and a detail message
    #[error("Server failure ({status}): {detail}")]
    ServerFailure {
        /// HTTP status (200 when the body itself carried `success: false`)
        status: u16,
        /// Server-provided detail message
        detail: String,
    },

    /// Required field missing or of the wrong shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Coarse category of an [`EnvError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Server,
    Malformed,
}

impl EnvError {
    /// Creates a network failure.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkFailure(msg.into())
    }

    /// Creates a server failure.
    pub fn server(status: u16, detail: impl Into<String>) -> Self {
        Self::ServerFailure {
            status,
            detail: detail.into(),
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Returns the category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkFailure(_) | Self::Timeout(_) => FailureKind::Network,
            Self::ServerFailure { .. } => FailureKind::Server,
            Self::MalformedResponse(_) => FailureKind::Malformed,
        }
    }

    /// Returns the most specific human-readable message available.
    ///
    /// Server failures yield the bare server detail; everything else yields
    /// the transport-level message.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::ServerFailure { detail, .. } if !detail.is_empty() => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_timeout_with_network() {
        assert_eq!(EnvError::Timeout(60_000).kind(), FailureKind::Network);
        assert_eq!(EnvError::network("refused").kind(), FailureKind::Network);
        assert_eq!(EnvError::server(500, "boom").kind(), FailureKind::Server);
        assert_eq!(EnvError::malformed("time").kind(), FailureKind::Malformed);
    }

    #[test]
    fn test_diagnostic_prefers_server_detail() {
        let err = EnvError::server(422, "Model e_coli_core not found");
        assert_eq!(err.diagnostic(), "Model e_coli_core not found");

        let err = EnvError::server(500, "");
        assert_eq!(err.diagnostic(), "Server failure (500): ");

        let err = EnvError::Timeout(60_000);
        assert_eq!(err.diagnostic(), "Timeout after 60000ms");
    }
}
