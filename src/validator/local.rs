/// Partie locale: '.' ni initial ni terminal. Les '..' et le jeu de
/// caractères sont déjà couverts par le motif global.
pub(crate) fn check_local(local: &str) -> Result<(), String> {
    if local.starts_with('.') || local.ends_with('.') {
        return Err("local part cannot start or end with '.'".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn edge_dots() {
        assert!(check_local(".abc").is_err());
        assert!(check_local("abc.").is_err());
        assert!(check_local("a.b").is_ok());
    }
}
