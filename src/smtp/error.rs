use thiserror::Error;

use super::types::{HandshakeStage, SmtpReply};

/// Failure of a single host handshake. Always caught by the probe loop and
/// folded into a [`ProbeOutcome`](super::ProbeOutcome).
#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("no socket address resolved for {host}")]
    NoAddress { host: String },
    #[error("address lookup for {host} failed: {source}")]
    Resolve {
        host: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{stage} rejected: {code} {message}")]
    Rejected {
        stage: HandshakeStage,
        code: u16,
        message: String,
    },
    #[error("verification deadline exceeded")]
    DeadlineExceeded,
}

impl SmtpError {
    pub(crate) fn connect(host: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            host: host.into(),
            source,
        }
    }

    pub(crate) fn resolve(
        host: impl Into<String>,
        source: trust_dns_resolver::error::ResolveError,
    ) -> Self {
        Self::Resolve {
            host: host.into(),
            source,
        }
    }

    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }

    pub(crate) fn rejected(stage: HandshakeStage, reply: &SmtpReply) -> Self {
        Self::Rejected {
            stage,
            code: reply.code,
            message: reply.message.clone(),
        }
    }

    /// Code SMTP associé à l'erreur, s'il y en a un.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}
