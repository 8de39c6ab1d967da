use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use trust_dns_resolver::{Resolver, error::ResolveError, system_conf};

use super::{Error, MxRecord, ResolverOptions};

/// Lookup MX records for `domain` using the system resolver, bounded by the
/// default [`ResolverOptions`].
///
/// Only resolver construction can fail; lookup failures yield an empty list.
pub fn resolve_mx(domain: &str) -> Result<Vec<MxRecord>, Error> {
    let resolver = build_resolver(&ResolverOptions::default())?;
    Ok(resolve_mx_with(&resolver, domain))
}

/// Builds a synchronous resolver from the system configuration, overriding
/// the timeout and attempt count.
pub fn build_resolver(options: &ResolverOptions) -> Result<Resolver, Error> {
    let (config, mut opts) = system_conf::read_system_conf().map_err(Error::resolver_init)?;
    opts.timeout = options.timeout;
    opts.attempts = options.attempts.max(1);
    Resolver::new(config, opts).map_err(Error::resolver_init)
}

/// Resolves `domain` through `resolver` and returns its hosts ordered by
/// ascending preference. Ties keep lookup order; duplicate exchanges are
/// dropped. NXDOMAIN, timeouts and malformed domains all give `vec![]`.
pub fn resolve_mx_with<R>(resolver: &R, domain: &str) -> Vec<MxRecord>
where
    R: LookupMx + ?Sized,
{
    let ascii = match normalize_domain(domain) {
        Ok(ascii) => ascii,
        Err(err) => {
            warn!(domain, error = %err, "MX lookup skipped");
            return Vec::new();
        }
    };

    let mut records = match resolver.lookup_mx(&ascii) {
        Ok(records) => records,
        Err(err) => {
            let err = Error::lookup(&ascii, err);
            if err.is_no_records() {
                warn!(domain = %ascii, "domain publishes no MX records");
            } else {
                warn!(error = %err, "MX record fetch failed");
            }
            return Vec::new();
        }
    };

    for record in &mut records {
        record.exchange = normalize_exchange(&record.exchange);
    }
    records.sort_by_key(|r| r.preference);
    let mut seen = HashSet::new();
    records.retain(|r| !r.exchange.is_empty() && seen.insert(r.exchange.clone()));

    debug!(domain = %ascii, count = records.len(), "MX records resolved");
    records
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(|err| Error::idna(trimmed, err))
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Source of MX records. Implemented for the system [`Resolver`]; tests plug
/// in stubs.
pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = Resolver::mx_lookup(self, domain)?;
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
            .collect())
    }
}

impl<T: LookupMx + ?Sized> LookupMx for Arc<T> {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        (**self).lookup_mx(domain)
    }
}

#[cfg(test)]
impl LookupMx for crate::mx::tests::StubResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        self.calls.set(self.calls.get() + 1);
        (self.on_lookup)(domain)
    }
}
