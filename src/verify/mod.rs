//! Verdict aggregation: syntax, MX resolution, then SMTP probe.
//!
//! Each stage short-circuits: a malformed address never reaches DNS, a domain
//! without MX hosts never reaches SMTP, and the probe stops at the first host
//! that accepts the recipient.

mod error;
mod options;
mod types;

pub use error::VerifyError;
pub use options::VerifyOptions;
pub use types::{FailureKind, Verdict, VerificationResult};

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn};
use trust_dns_resolver::Resolver;

use crate::mx::{LookupMx, MxRecord, build_resolver, resolve_mx_with};
use crate::smtp::{
    HandshakeStage, HostConnector, ProbeResult, ProbeStatus, TcpConnector, probe_with,
};
use crate::validator::{ascii_domain, split_address, validate_syntax};

const NO_MX_REASON: &str = "No MX records found";
const ALL_FAILED_REASON: &str = "All SMTP attempts failed";

/// Checks that `email` is well-formed and accepted by one of its MX hosts,
/// using the system resolver and default options.
pub fn verify_email(email: &str) -> Result<VerificationResult, VerifyError> {
    let verifier = Verifier::new(VerifyOptions::default())?;
    Ok(verifier.verify(email))
}

/// Stateless verification engine. Holds configuration, the resolver and the
/// transport; a single instance can serve concurrent calls when `R` and `C`
/// are `Sync`.
#[derive(Debug)]
pub struct Verifier<R = Arc<Resolver>, C = TcpConnector> {
    resolver: R,
    connector: C,
    options: VerifyOptions,
}

impl Verifier {
    /// Builds a verifier over the system resolver, shared by the MX lookup and
    /// the host address lookup. Fails only when the DNS configuration cannot
    /// be read.
    pub fn new(options: VerifyOptions) -> Result<Self, VerifyError> {
        let resolver = Arc::new(build_resolver(&options.resolver)?);
        let connector = TcpConnector::new(options.probe.port, Arc::clone(&resolver));
        Ok(Self::with_parts(resolver, connector, options))
    }
}

impl<R, C> Verifier<R, C>
where
    R: LookupMx,
    C: HostConnector,
{
    pub fn with_parts(resolver: R, connector: C, options: VerifyOptions) -> Self {
        Self {
            resolver,
            connector,
            options,
        }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn verify(&self, email: &str) -> VerificationResult {
        let started = Instant::now();
        let email = email.trim();
        let span = info_span!("verify", email = %email);
        let _entered = span.enter();
        info!("validating email");

        let report = validate_syntax(email, &self.options.syntax);
        let split = split_address(email).filter(|_| report.ok);
        let Some((local, domain)) = split else {
            let reason = report
                .reason
                .unwrap_or_else(|| "invalid email format".to_string());
            warn!(%reason, "invalid syntax");
            return VerificationResult::rejected(
                email,
                FailureKind::MalformedAddress,
                reason,
                started.elapsed(),
            );
        };

        let hosts = resolve_mx_with(&self.resolver, domain);
        if hosts.is_empty() {
            warn!(domain, "no MX records found");
            return VerificationResult::rejected(
                email,
                FailureKind::NoMailRoute,
                NO_MX_REASON,
                started.elapsed(),
            );
        }

        let domain = ascii_domain(domain).unwrap_or_else(|_| domain.to_string());
        let recipient = format!("{local}@{domain}");
        let deadline = self.options.probe.deadline.map(|budget| started + budget);
        let probe = probe_with(
            &self.connector,
            &recipient,
            &hosts,
            &self.options.probe,
            deadline,
        );

        let result = conclude(email, hosts, probe, started);
        info!(
            verdict = %result.verdict,
            reason = %result.reason,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "validation result"
        );
        result
    }
}

fn conclude(
    email: &str,
    mx_hosts: Vec<MxRecord>,
    probe: ProbeResult,
    started: Instant,
) -> VerificationResult {
    // un refus 5xx décide du verdict, même suivi d'échecs temporaires
    let rejection = probe.last_permanent_rejection();
    let (verdict, failure, reason) = match (probe.status, probe.accepted(), rejection) {
        (ProbeStatus::Accepted, Some(accepted), _) => (
            Verdict::Deliverable,
            None,
            format!(
                "Valid. Response time: {:.2}s. Server: {}",
                accepted.elapsed.as_secs_f64(),
                accepted.message.as_deref().unwrap_or_default()
            ),
        ),
        (ProbeStatus::DeadlineExceeded, _, _) => (
            Verdict::Indeterminate,
            Some(FailureKind::ProbeExhausted),
            format!(
                "Inconclusive. Deadline exceeded after {} host(s): {}",
                probe.attempts.len(),
                failure_detail(&probe)
            ),
        ),
        (_, _, Some(rejection)) => (
            Verdict::Undeliverable,
            Some(FailureKind::ProbeExhausted),
            format!("Invalid. Server: {}", rejection.detail()),
        ),
        _ => (
            Verdict::Indeterminate,
            Some(FailureKind::ProbeExhausted),
            format!("Inconclusive. Server: {}", failure_detail(&probe)),
        ),
    };

    VerificationResult {
        email: email.to_string(),
        verdict,
        reason,
        elapsed: started.elapsed(),
        failure,
        mx_hosts,
        attempts: probe.attempts,
    }
}

/// Last failure detail, or the generic message when no host got past TCP
/// connect.
fn failure_detail(probe: &ProbeResult) -> String {
    let reached_any = probe
        .attempts
        .iter()
        .any(|a| a.stage != HandshakeStage::Connect);
    match probe.last_failure() {
        Some(last) if reached_any => last.detail(),
        _ => ALL_FAILED_REASON.to_string(),
    }
}
