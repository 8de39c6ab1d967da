use std::collections::HashSet;
use std::io::BufRead;

use super::disposable::DEFAULT_DISPOSABLE_DOMAINS;
use super::types::PolicyError;

/// Règles configurables du validateur syntaxique.
///
/// La liste de domaines jetables est injectée: chargée une fois au démarrage,
/// elle peut être étendue sans toucher à la logique de validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxPolicy {
    blocked_domains: HashSet<String>,
}

impl SyntaxPolicy {
    /// Politique sans liste de blocage.
    pub fn empty() -> Self {
        Self {
            blocked_domains: HashSet::new(),
        }
    }

    pub fn with_blocked_domain(mut self, domain: impl Into<String>) -> Self {
        if let Some(normalized) = normalize_entry(&domain.into()) {
            self.blocked_domains.insert(normalized);
        }
        self
    }

    pub fn with_blocked_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for domain in domains {
            self = self.with_blocked_domain(domain);
        }
        self
    }

    /// Ajoute les domaines lus depuis `reader` (un par ligne, `#` pour les
    /// commentaires, lignes vides ignorées).
    pub fn with_blocklist_reader<R: BufRead>(mut self, reader: R) -> Result<Self, PolicyError> {
        for line in reader.lines() {
            let line = line.map_err(PolicyError::read)?;
            let entry = line.split('#').next().unwrap_or_default();
            if let Some(normalized) = normalize_entry(entry) {
                self.blocked_domains.insert(normalized);
            }
        }
        Ok(self)
    }

    pub fn is_disposable(&self, domain: &str) -> bool {
        normalize_entry(domain).is_some_and(|d| self.blocked_domains.contains(&d))
    }

    pub fn blocked_domains(&self) -> impl Iterator<Item = &str> {
        self.blocked_domains.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blocked_domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked_domains.is_empty()
    }
}

impl Default for SyntaxPolicy {
    fn default() -> Self {
        Self::empty().with_blocked_domains(DEFAULT_DISPOSABLE_DOMAINS.iter().copied())
    }
}

fn normalize_entry(input: &str) -> Option<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
