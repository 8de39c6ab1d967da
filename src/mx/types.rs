use std::time::Duration;

/// Hôte d'échange de courrier résolu; `preference` faible = essayé en premier.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Bornes appliquées à la résolution MX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub timeout: Duration,
    pub attempts: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            attempts: 2,
        }
    }
}
