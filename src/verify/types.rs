use std::fmt;
use std::time::Duration;

use crate::mx::MxRecord;
use crate::smtp::ProbeOutcome;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Deliverable,
    Undeliverable,
    Indeterminate,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deliverable => "deliverable",
            Self::Undeliverable => "undeliverable",
            Self::Indeterminate => "indeterminate",
        })
    }
}

/// Why a verification stopped short of acceptance.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A syntax rule was violated; no network activity happened.
    MalformedAddress,
    /// No MX host could be resolved for the domain.
    NoMailRoute,
    /// Every candidate host refused, errored or timed out.
    ProbeExhausted,
    /// One host failed; recovered by moving to the next one. Only ever seen
    /// on individual attempts.
    HostTransientError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MalformedAddress => "malformed address",
            Self::NoMailRoute => "no mail route",
            Self::ProbeExhausted => "probe exhausted",
            Self::HostTransientError => "host transient error",
        })
    }
}

/// Final output of [`Verifier::verify`](super::Verifier::verify).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub email: String,
    pub verdict: Verdict,
    pub reason: String,
    pub elapsed: Duration,
    pub failure: Option<FailureKind>,
    pub mx_hosts: Vec<MxRecord>,
    pub attempts: Vec<ProbeOutcome>,
}

impl VerificationResult {
    pub(crate) fn rejected(
        email: &str,
        failure: FailureKind,
        reason: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            email: email.to_string(),
            verdict: Verdict::Undeliverable,
            reason: reason.into(),
            elapsed,
            failure: Some(failure),
            mx_hosts: Vec::new(),
            attempts: Vec::new(),
        }
    }

    pub fn is_deliverable(&self) -> bool {
        self.verdict == Verdict::Deliverable
    }

    /// `elapsed` formatted like `"1.23s"`.
    pub fn response_time(&self) -> String {
        format!("{:.2}s", self.elapsed.as_secs_f64())
    }
}
