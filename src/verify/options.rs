use crate::mx::ResolverOptions;
use crate::smtp::ProbeOptions;
use crate::validator::SyntaxPolicy;

/// Réglages de [`Verifier`](super::Verifier), un par étape.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub syntax: SyntaxPolicy,
    pub resolver: ResolverOptions,
    pub probe: ProbeOptions,
}
