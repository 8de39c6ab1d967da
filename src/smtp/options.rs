use std::time::Duration;

/// Controls how [`probe`](super::probe) interrogates SMTP servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub port: u16,
    /// Nom annoncé dans `HELO`/`EHLO`; volontairement neutre.
    pub helo_name: String,
    /// Expéditeur fictif de `MAIL FROM`, jamais l'adresse de l'opérateur.
    pub mail_from: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub max_hosts: usize,
    pub use_ehlo: bool,
    /// Budget global de la sonde, tous hôtes confondus.
    pub deadline: Option<Duration>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_name: "example.com".to_string(),
            mail_from: "test@example.com".to_string(),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            max_hosts: 5,
            use_ehlo: false,
            deadline: None,
        }
    }
}

impl ProbeOptions {
    pub(crate) fn greeting_command(&self) -> String {
        let verb = if self.use_ehlo { "EHLO" } else { "HELO" };
        format!("{verb} {}", self.helo_name)
    }

    pub(crate) fn envelope_command(&self) -> String {
        format!("MAIL FROM:<{}>", self.mail_from)
    }
}
