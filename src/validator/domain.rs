/// Valide le domaine: au moins un point, pas de '.' initial, aucun label
/// commençant ou finissant par '-'.
pub(crate) fn check_domain(domain: &str) -> Result<(), String> {
    if !domain.contains('.') {
        return Err("domain must contain at least one dot".to_string());
    }
    if domain.starts_with('.') {
        return Err("domain cannot start with '.'".to_string());
    }
    if domain.starts_with('-') || domain.ends_with('-') {
        return Err("domain cannot start or end with '-'".to_string());
    }
    for label in domain.split('.') {
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("domain label '{label}' cannot start/end with '-'"));
        }
    }
    Ok(())
}

/// Conversion IDNA du domaine, pour l'interrogation DNS et l'enveloppe SMTP.
pub(crate) fn ascii_domain(domain: &str) -> Result<String, idna::Errors> {
    idna::domain_to_ascii(domain.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn basic_domain_ok() {
        assert!(check_domain("example.com").is_ok());
        assert!(check_domain("mail-1.example.com").is_ok());
    }

    #[test]
    fn hyphen_edges() {
        assert!(check_domain("-example.com").is_err());
        assert!(check_domain("example.com-").is_err());
        assert!(check_domain("sub.-bad.com").is_err());
    }

    #[test]
    fn ascii_conversion() {
        assert_eq!(ascii_domain("exämple.com").unwrap(), "xn--exmple-cua.com");
        assert_eq!(ascii_domain("Example.COM").unwrap(), "example.com");
    }
}
