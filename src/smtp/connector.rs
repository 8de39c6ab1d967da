use std::fmt;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;
use trust_dns_resolver::Resolver;

use super::SmtpError;
use super::session::remaining;
use crate::mx::{ResolverOptions, build_resolver};

/// Ouvre la connexion TCP vers un hôte MX. Le port et la résolution
/// d'adresse sont propres à l'implémentation; aucune étape ne doit dépasser
/// `timeout` ni `deadline`.
pub trait HostConnector {
    fn connect(
        &self,
        host: &str,
        timeout: Duration,
        deadline: Option<Instant>,
    ) -> Result<(TcpStream, SocketAddr), SmtpError>;
}

/// Connecteur par défaut: résout A/AAAA via le résolveur borné et essaie
/// chaque adresse, dans la limite de `connect_timeout` au total.
#[derive(Clone)]
pub struct TcpConnector {
    pub port: u16,
    resolver: Option<Arc<Resolver>>,
}

impl TcpConnector {
    pub fn new(port: u16, resolver: Arc<Resolver>) -> Self {
        Self {
            port,
            resolver: Some(resolver),
        }
    }

    /// Résolveur système avec les bornes par défaut. S'il est indisponible,
    /// seuls les hôtes donnés en adresse IP restent joignables.
    pub fn system(port: u16) -> Self {
        match build_resolver(&ResolverOptions::default()) {
            Ok(resolver) => Self::new(port, Arc::new(resolver)),
            Err(err) => {
                warn!(error = %err, "no DNS resolver, only IP literal hosts can be probed");
                Self {
                    port,
                    resolver: None,
                }
            }
        }
    }

    fn addresses(&self, host: &str) -> Result<Vec<SocketAddr>, SmtpError> {
        if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, self.port)]);
        }
        let Some(resolver) = &self.resolver else {
            return Err(SmtpError::NoAddress {
                host: host.to_string(),
            });
        };
        let lookup = resolver
            .lookup_ip(host)
            .map_err(|err| SmtpError::resolve(host, err))?;
        Ok(lookup
            .iter()
            .map(|ip| SocketAddr::new(ip, self.port))
            .collect())
    }
}

impl fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConnector")
            .field("port", &self.port)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl HostConnector for TcpConnector {
    fn connect(
        &self,
        host: &str,
        timeout: Duration,
        deadline: Option<Instant>,
    ) -> Result<(TcpStream, SocketAddr), SmtpError> {
        let connect_by = Instant::now() + timeout;
        let addrs = self.addresses(host)?;
        connect_any(host, &addrs, connect_by, deadline)
    }
}

/// Essaie chaque adresse tour à tour. Le budget de chaque tentative est ce
/// qui reste avant `connect_by` et avant `deadline`.
pub(crate) fn connect_any(
    host: &str,
    addrs: &[SocketAddr],
    connect_by: Instant,
    deadline: Option<Instant>,
) -> Result<(TcpStream, SocketAddr), SmtpError> {
    if addrs.is_empty() {
        return Err(SmtpError::NoAddress {
            host: host.to_string(),
        });
    }
    let mut last_err = None;
    for addr in addrs {
        let Some(budget) = attempt_budget(connect_by, deadline)? else {
            break;
        };
        match TcpStream::connect_timeout(addr, budget) {
            Ok(stream) => return Ok((stream, *addr)),
            Err(err) => last_err = Some(err),
        }
    }
    let err = last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timeout spent")
    });
    Err(SmtpError::connect(host, err))
}

/// `None` quand le délai de connexion est épuisé, `DeadlineExceeded` quand
/// c'est le budget global.
pub(crate) fn attempt_budget(
    connect_by: Instant,
    deadline: Option<Instant>,
) -> Result<Option<Duration>, SmtpError> {
    let left = connect_by.saturating_duration_since(Instant::now());
    let budget = remaining(deadline, left)?;
    if left.is_zero() {
        return Ok(None);
    }
    Ok(Some(budget))
}
