use thiserror::Error;

/// Résultat de la vérification syntaxique: la première règle violée fournit
/// `reason`.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub ok: bool,
    pub reason: Option<String>,
}

impl ValidationReport {
    pub(crate) fn accepted() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read blocklist: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },
}

impl PolicyError {
    pub(crate) fn read(source: std::io::Error) -> Self {
        Self::Read { source }
    }
}
