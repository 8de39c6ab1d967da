use std::io;

use thiserror::Error;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

#[derive(Debug, Error)]
pub enum MxError {
    #[error("empty domain, nothing to resolve")]
    EmptyDomain,
    #[error("cannot convert '{domain}' to ASCII")]
    IdnaConversion {
        domain: String,
        #[source]
        source: idna::Errors,
    },
    #[error("cannot build DNS resolver from system configuration: {source}")]
    ResolverInit {
        #[source]
        source: io::Error,
    },
    #[error("MX lookup for '{domain}' failed: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(domain: &str, source: idna::Errors) -> Self {
        Self::IdnaConversion {
            domain: domain.to_string(),
            source,
        }
    }

    pub(crate) fn resolver_init(source: io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn lookup(domain: &str, source: ResolveError) -> Self {
        Self::Lookup {
            domain: domain.to_string(),
            source,
        }
    }

    /// `true` quand le domaine existe mais ne publie aucun MX (ou NXDOMAIN).
    pub fn is_no_records(&self) -> bool {
        matches!(
            self,
            Self::Lookup { source, .. }
                if matches!(source.kind(), ResolveErrorKind::NoRecordsFound { .. })
        )
    }
}
