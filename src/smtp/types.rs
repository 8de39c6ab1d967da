use std::fmt;
use std::time::Duration;

/// Étape du dialogue SMTP atteinte lors d'une tentative.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Connect,
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
        })
    }
}

/// A raw SMTP reply, preserving the numeric status code and message text.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }
}

/// Catégorie de la réponse obtenue d'un hôte.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Accepted,
    TemporaryFailure,
    PermanentFailure,
    ConnectionError,
}

impl ResponseClass {
    pub fn from_reply(reply: &SmtpReply) -> Self {
        if reply.is_positive_completion() {
            Self::Accepted
        } else if reply.is_transient_failure() {
            Self::TemporaryFailure
        } else if reply.is_permanent_failure() {
            Self::PermanentFailure
        } else {
            Self::ConnectionError
        }
    }
}

/// Outcome of a handshake attempt against a single MX host.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub host: String,
    pub class: ResponseClass,
    pub stage: HandshakeStage,
    pub code: Option<u16>,
    pub message: Option<String>,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    pub(crate) fn from_rcpt_reply(host: &str, reply: SmtpReply, elapsed: Duration) -> Self {
        Self {
            host: host.to_string(),
            class: ResponseClass::from_reply(&reply),
            stage: HandshakeStage::RcptTo,
            code: Some(reply.code),
            message: Some(reply.message),
            elapsed,
        }
    }

    pub(crate) fn connection_error(
        host: &str,
        stage: HandshakeStage,
        error: &super::SmtpError,
        elapsed: Duration,
    ) -> Self {
        Self {
            host: host.to_string(),
            class: ResponseClass::ConnectionError,
            stage,
            code: error.code(),
            message: Some(error.to_string()),
            elapsed,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.class == ResponseClass::Accepted
    }

    /// Texte de diagnostic: `"550 user unknown"` pour une réponse, message
    /// d'erreur sinon.
    pub fn detail(&self) -> String {
        let message = self.message.as_deref().unwrap_or_default();
        match (self.stage, self.code) {
            (HandshakeStage::RcptTo, Some(code)) if message.is_empty() => code.to_string(),
            (HandshakeStage::RcptTo, Some(code)) => format!("{code} {message}"),
            _ => message.to_string(),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Un hôte a accepté le destinataire; c'est la dernière tentative.
    Accepted,
    /// Tous les hôtes ont été essayés sans acceptation.
    Exhausted,
    /// Le budget global a expiré avant une réponse définitive.
    DeadlineExceeded,
}

/// Résultat agrégé de [`probe`](super::probe), tentatives dans l'ordre.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub attempts: Vec<ProbeOutcome>,
}

impl ProbeResult {
    pub fn accepted(&self) -> Option<&ProbeOutcome> {
        match self.status {
            ProbeStatus::Accepted => self.attempts.last(),
            _ => None,
        }
    }

    pub fn last_failure(&self) -> Option<&ProbeOutcome> {
        self.attempts.iter().rev().find(|a| !a.is_accepted())
    }

    pub fn any_permanent_rejection(&self) -> bool {
        self.last_permanent_rejection().is_some()
    }

    /// Dernier refus définitif (5xx sur `RCPT TO`), même si d'autres hôtes
    /// ont échoué après.
    pub fn last_permanent_rejection(&self) -> Option<&ProbeOutcome> {
        self.attempts
            .iter()
            .rev()
            .find(|a| a.class == ResponseClass::PermanentFailure)
    }
}
