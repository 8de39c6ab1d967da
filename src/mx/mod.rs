//! Résolution DNS des enregistrements MX.
//!
//! [`resolve_mx`] interroge le résolveur système (avec délai borné) et renvoie
//! les hôtes triés par préférence croissante. Un échec de résolution donne une
//! liste vide: pour l'appelant, c'est l'absence de route de livraison.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, build_resolver, resolve_mx, resolve_mx_with};
pub use types::{MxRecord, ResolverOptions};
