use anyhow::Result;
#[cfg(not(feature = "with-serde"))]
use anyhow::bail;
use mailprobe_lib::{ValidationReport, Verdict, VerificationResult};

use crate::args::Format;

/// Codes de sortie: 0 délivrable/valide, 2 non délivrable/invalide,
/// 3 indéterminé. 1 est réservé aux erreurs fatales.
pub fn exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Deliverable => 0,
        Verdict::Undeliverable => 2,
        Verdict::Indeterminate => 3,
    }
}

pub fn write_verification(result: &VerificationResult, format: Format) -> Result<()> {
    match format {
        Format::Human => {
            print!("{}", human_verification(result));
            Ok(())
        }
        Format::Json => write_json(result),
    }
}

pub fn write_validation(email: &str, report: &ValidationReport, format: Format) -> Result<()> {
    match format {
        Format::Human => {
            match &report.reason {
                None => println!("[OK]      {email}"),
                Some(reason) => println!("[INVALID] {email} :: {reason}"),
            }
            Ok(())
        }
        Format::Json => write_validation_json(email, report),
    }
}

fn human_verification(result: &VerificationResult) -> String {
    let tag = match result.verdict {
        Verdict::Deliverable => "[OK]     ",
        Verdict::Undeliverable => "[INVALID]",
        Verdict::Indeterminate => "[UNKNOWN]",
    };
    let mut out = format!("{tag} {} :: {}\n", result.email, result.reason);
    if !result.mx_hosts.is_empty() {
        let hosts: Vec<_> = result
            .mx_hosts
            .iter()
            .map(|mx| format!("{} ({})", mx.exchange, mx.preference))
            .collect();
        out.push_str(&format!("        mx: {}\n", hosts.join(", ")));
    }
    for attempt in &result.attempts {
        out.push_str(&format!(
            "        {} @ {}: {}\n",
            attempt.host,
            attempt.stage,
            attempt.detail()
        ));
    }
    out
}

#[cfg(feature = "with-serde")]
fn write_json(result: &VerificationResult) -> Result<()> {
    let payload = payload::VerificationPayload::new(result, chrono::Utc::now());
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_result: &VerificationResult) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-serde")]
fn write_validation_json(email: &str, report: &ValidationReport) -> Result<()> {
    let payload = payload::ValidationPayload::new(email, report, chrono::Utc::now());
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_validation_json(_email: &str, _report: &ValidationReport) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

/// Erreur fatale au format de sortie demandé.
pub fn write_error(format: Format, message: &str) -> Result<()> {
    match format {
        Format::Human => {
            eprintln!("error: {message}");
            Ok(())
        }
        Format::Json => {
            #[cfg(feature = "with-serde")]
            {
                let payload = serde_json::json!({ "valid": false, "message": message });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                Ok(())
            }
            #[cfg(not(feature = "with-serde"))]
            {
                bail!("format=json nécessite la feature 'with-serde'")
            }
        }
    }
}

#[cfg(feature = "with-serde")]
mod payload {
    use chrono::{DateTime, SecondsFormat, Utc};
    use mailprobe_lib::{
        FailureKind, MxRecord, ProbeOutcome, ValidationReport, Verdict, VerificationResult,
    };
    use serde::Serialize;

    /// Forme JSON d'une vérification: `valid`, `message`, `email`,
    /// `response_time`, `timestamp`, puis le détail du diagnostic.
    #[derive(Serialize)]
    pub struct VerificationPayload<'a> {
        pub valid: bool,
        pub message: &'a str,
        pub email: &'a str,
        pub response_time: String,
        pub timestamp: String,
        pub verdict: Verdict,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub failure: Option<FailureKind>,
        pub mx_hosts: &'a [MxRecord],
        pub attempts: &'a [ProbeOutcome],
    }

    impl<'a> VerificationPayload<'a> {
        pub fn new(result: &'a VerificationResult, now: DateTime<Utc>) -> Self {
            Self {
                valid: result.is_deliverable(),
                message: &result.reason,
                email: &result.email,
                response_time: result.response_time(),
                timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                verdict: result.verdict,
                failure: result.failure,
                mx_hosts: &result.mx_hosts,
                attempts: &result.attempts,
            }
        }
    }

    #[derive(Serialize)]
    pub struct ValidationPayload<'a> {
        pub valid: bool,
        pub message: &'a str,
        pub email: &'a str,
        pub timestamp: String,
    }

    impl<'a> ValidationPayload<'a> {
        pub fn new(email: &'a str, report: &'a ValidationReport, now: DateTime<Utc>) -> Self {
            Self {
                valid: report.ok,
                message: report.reason.as_deref().unwrap_or("Valid syntax"),
                email,
                timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mailprobe_lib::{FailureKind, MxRecord};

    fn result(verdict: Verdict, reason: &str) -> VerificationResult {
        VerificationResult {
            email: "user@example.com".to_string(),
            verdict,
            reason: reason.to_string(),
            elapsed: Duration::from_millis(1234),
            failure: None,
            mx_hosts: vec![MxRecord::new(10, "mx.example.com")],
            attempts: Vec::new(),
        }
    }

    #[test]
    fn exit_codes_follow_verdict() {
        assert_eq!(exit_code(Verdict::Deliverable), 0);
        assert_eq!(exit_code(Verdict::Undeliverable), 2);
        assert_eq!(exit_code(Verdict::Indeterminate), 3);
    }

    #[test]
    fn human_lists_mx_hosts() {
        let text = human_verification(&result(Verdict::Deliverable, "Valid."));
        assert!(text.starts_with("[OK]      user@example.com :: Valid."));
        assert!(text.contains("mx: mx.example.com (10)"));
    }

    #[cfg(feature = "with-serde")]
    #[test]
    fn json_mirrors_response_shape() {
        use chrono::TimeZone;

        let mut res = result(Verdict::Undeliverable, "No MX records found");
        res.failure = Some(FailureKind::NoMailRoute);
        let now = chrono::Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid date");
        let value = serde_json::to_value(payload::VerificationPayload::new(&res, now))
            .expect("serialize");

        assert_eq!(value["valid"], false);
        assert_eq!(value["message"], "No MX records found");
        assert_eq!(value["response_time"], "1.23s");
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(value["verdict"], "undeliverable");
        assert_eq!(value["failure"], "NoMailRoute");
        assert_eq!(value["mx_hosts"][0]["exchange"], "mx.example.com");
    }

    #[cfg(not(feature = "with-serde"))]
    #[test]
    fn json_requires_serde() {
        let _ = FailureKind::NoMailRoute;
        assert!(write_json(&result(Verdict::Deliverable, "ok")).is_err());
    }
}
