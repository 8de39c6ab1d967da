mod disposable;
mod domain;
mod local;
mod policy;
mod types;

pub use policy::SyntaxPolicy;
pub use types::{PolicyError, ValidationReport};

pub(crate) use domain::ascii_domain;

use std::sync::LazyLock;

use regex::Regex;

use domain::check_domain;
use local::check_local;

/// Longueurs en caractères (et non en octets). Chemin complet, `@` compris.
pub const MAX_ADDRESS_LEN: usize = 254;
pub const MAX_LOCAL_LEN: usize = 64;
pub const MAX_DOMAIN_LEN: usize = 253;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@[\w.-]+\.[A-Za-z]{2,}$").expect("address pattern compiles")
});

/// Vérifie le format d'une adresse avant tout accès réseau.
///
/// Les règles sont appliquées dans l'ordre; la première violée fournit la
/// raison du rejet. Aucune I/O n'est effectuée.
pub fn validate_syntax(email: &str, policy: &SyntaxPolicy) -> ValidationReport {
    let input = email.trim();

    let total = input.chars().count();
    if total > MAX_ADDRESS_LEN {
        return ValidationReport::rejected(format!("total length {total} > {MAX_ADDRESS_LEN}"));
    }

    if !ADDRESS_PATTERN.is_match(input) {
        return ValidationReport::rejected("invalid email format");
    }

    // le motif garantit exactement un '@'
    let Some((local, domain)) = split_address(input) else {
        return ValidationReport::rejected("must contain exactly one '@'");
    };

    let local_len = local.chars().count();
    if local_len > MAX_LOCAL_LEN {
        return ValidationReport::rejected(format!(
            "local part length {local_len} > {MAX_LOCAL_LEN}"
        ));
    }
    let domain_len = domain.chars().count();
    if domain_len > MAX_DOMAIN_LEN {
        return ValidationReport::rejected(format!(
            "domain length {domain_len} > {MAX_DOMAIN_LEN}"
        ));
    }

    if input.contains("..") {
        return ValidationReport::rejected("consecutive dots are not allowed");
    }

    if let Err(reason) = check_local(local) {
        return ValidationReport::rejected(reason);
    }
    if let Err(reason) = check_domain(domain) {
        return ValidationReport::rejected(reason);
    }

    if policy.is_disposable(domain) {
        return ValidationReport::rejected(format!("disposable domain '{domain}' is not accepted"));
    }

    ValidationReport::accepted()
}

/// Découpe `local@domain`. Retourne `None` si l'adresse ne contient pas
/// exactement un '@'.
pub fn split_address(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.trim().split_once('@')?;
    if domain.contains('@') {
        return None;
    }
    Some((local, domain))
}
