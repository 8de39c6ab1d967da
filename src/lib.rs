#![forbid(unsafe_code)]
//! mailprobe_lib: vérification de délivrabilité e-mail (syntaxe, MX, sonde SMTP)

pub mod mx;
pub mod smtp;
pub mod validator;
pub mod verify;

pub use mx::{
    Error as MxError, LookupMx, MxRecord, ResolverOptions, build_resolver, resolve_mx,
    resolve_mx_with,
};
pub use smtp::{
    HandshakeStage, HostConnector, ProbeOptions, ProbeOutcome, ProbeResult, ProbeStatus,
    ResponseClass, SmtpError, SmtpReply, TcpConnector, probe, probe_with,
};
pub use validator::{PolicyError, SyntaxPolicy, ValidationReport, split_address, validate_syntax};
pub use verify::{
    FailureKind, Verdict, VerificationResult, Verifier, VerifyError, VerifyOptions, verify_email,
};
