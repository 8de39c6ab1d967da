use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use tracing::debug;

use super::connector::HostConnector;
use super::types::{HandshakeStage, SmtpReply};
use super::SmtpError;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);
/// Longueur maximale d'une ligne de réponse, CRLF compris.
pub(crate) const MAX_LINE_LEN: usize = 8192;
/// Nombre maximal de lignes dans une réponse multi-lignes.
pub(crate) const MAX_REPLY_LINES: usize = 128;

/// Session SMTP sur une connexion TCP. Le socket est fermé au `Drop`, quel
/// que soit le chemin de sortie.
pub(crate) struct SmtpSession {
    host: String,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    command_timeout: Duration,
    deadline: Option<Instant>,
}

impl SmtpSession {
    pub(crate) fn connect<C>(
        connector: &C,
        host: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
        deadline: Option<Instant>,
    ) -> Result<(Self, SocketAddr), SmtpError>
    where
        C: HostConnector + ?Sized,
    {
        let timeout = remaining(deadline, connect_timeout)?;
        let (stream, peer) = connector.connect(host, timeout, deadline)?;
        let reader = BufReader::new(stream.try_clone().map_err(SmtpError::io)?);
        debug!(host, %peer, "SMTP connection established");
        let session = Self {
            host: host.to_string(),
            stream,
            reader,
            command_timeout,
            deadline,
        };
        Ok((session, peer))
    }

    /// Clamp socket deadlines to the remaining budget before each exchange.
    fn arm(&mut self) -> Result<(), SmtpError> {
        let timeout = remaining(self.deadline, self.command_timeout)?;
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(SmtpError::io)?;
        self.stream
            .set_write_timeout(Some(timeout))
            .map_err(SmtpError::io)?;
        Ok(())
    }

    pub(crate) fn command(&mut self, command: &str) -> Result<SmtpReply, SmtpError> {
        self.arm()?;
        debug!(host = %self.host, "C: {command}");
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        self.stream.write_all(&line).map_err(SmtpError::io)?;
        self.stream.flush().map_err(SmtpError::io)?;
        self.read_reply()
    }

    /// Lit une réponse complète en moins de `command_timeout`. Le budget est
    /// recalculé avant chaque lecture du socket, si bien qu'un serveur qui
    /// distille sa réponse ne peut pas dépasser `deadline`.
    pub(crate) fn read_reply(&mut self) -> Result<SmtpReply, SmtpError> {
        let reply_by = Instant::now() + self.command_timeout;
        let deadline = self.deadline;
        let stream = &self.stream;
        let reply = read_reply_from(&mut self.reader, || {
            let timeout = reply_budget(deadline, reply_by)?;
            stream.set_read_timeout(Some(timeout)).map_err(SmtpError::io)
        })?;
        debug!(host = %self.host, "S: {} {}", reply.code, reply.message);
        Ok(reply)
    }

    /// `QUIT` best effort; la réponse est ignorée.
    pub(crate) fn quit(&mut self) {
        if let Err(err) = self.command("QUIT") {
            debug!(host = %self.host, error = %err, "QUIT failed");
        }
    }
}

impl Drop for SmtpSession {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Échoue avec `Rejected` si la réponse n'est pas 2xx.
pub(crate) fn expect_positive(
    stage: HandshakeStage,
    reply: SmtpReply,
) -> Result<SmtpReply, SmtpError> {
    if reply.is_positive_completion() {
        Ok(reply)
    } else {
        Err(SmtpError::rejected(stage, &reply))
    }
}

pub(crate) fn remaining(deadline: Option<Instant>, timeout: Duration) -> Result<Duration, SmtpError> {
    let timeout = timeout.max(MIN_TIMEOUT);
    match deadline {
        None => Ok(timeout),
        Some(deadline) => {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                Err(SmtpError::DeadlineExceeded)
            } else {
                Ok(left.min(timeout).max(MIN_TIMEOUT))
            }
        }
    }
}

pub(crate) fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Temps restant pour la réponse en cours, borné par `deadline`.
fn reply_budget(deadline: Option<Instant>, reply_by: Instant) -> Result<Duration, SmtpError> {
    if deadline_passed(deadline) {
        return Err(SmtpError::DeadlineExceeded);
    }
    let left = reply_by.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(SmtpError::io(io::Error::new(
            io::ErrorKind::TimedOut,
            "SMTP reply timed out",
        )));
    }
    remaining(deadline, left)
}

/// Lit une réponse SMTP, éventuellement multi-lignes (`250-...`).
///
/// `before_read` est appelé avant chaque lecture sur `reader`; il peut
/// interrompre la lecture (délai épuisé). Lignes et réponse sont bornées par
/// [`MAX_LINE_LEN`] et [`MAX_REPLY_LINES`].
pub(crate) fn read_reply_from<R, F>(reader: &mut R, mut before_read: F) -> Result<SmtpReply, SmtpError>
where
    R: BufRead,
    F: FnMut() -> Result<(), SmtpError>,
{
    let mut code = None;
    let mut message_lines = Vec::new();
    for _ in 0..MAX_REPLY_LINES {
        let Some(bytes) = read_line_capped(reader, &mut before_read)? else {
            return Err(SmtpError::io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading reply",
            )));
        };
        let mut raw = String::from_utf8_lossy(&bytes).into_owned();
        if raw.ends_with('\n') {
            raw.pop();
            if raw.ends_with('\r') {
                raw.pop();
            }
        }

        if raw.len() < 3 || !raw.is_char_boundary(3) {
            return Err(SmtpError::Protocol(format!("invalid SMTP reply: '{raw}'")));
        }
        let code_part = &raw[..3];
        let parsed_code = code_part
            .parse::<u16>()
            .map_err(|_| SmtpError::Protocol(format!("invalid SMTP status code: '{code_part}'")))?;
        match code {
            Some(existing) if existing != parsed_code => {
                return Err(SmtpError::Protocol(format!(
                    "inconsistent SMTP reply codes: {existing} vs {parsed_code}"
                )));
            }
            Some(_) => {}
            None => code = Some(parsed_code),
        }
        let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
        let text = raw.get(4..).unwrap_or_default().trim();
        if !text.is_empty() {
            message_lines.push(text.to_string());
        }
        if !continuation {
            return Ok(SmtpReply {
                code: parsed_code,
                message: message_lines.join(" "),
            });
        }
    }
    Err(SmtpError::Protocol(format!(
        "SMTP reply exceeds {MAX_REPLY_LINES} lines"
    )))
}

/// Une ligne terminée par `\n` (ou la fin du flux). `None` si le flux est
/// fermé avant le moindre octet.
fn read_line_capped<R, F>(reader: &mut R, before_read: &mut F) -> Result<Option<Vec<u8>>, SmtpError>
where
    R: BufRead,
    F: FnMut() -> Result<(), SmtpError>,
{
    let mut line = Vec::new();
    loop {
        before_read()?;
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(SmtpError::io(err)),
        };
        if available.is_empty() {
            return Ok((!line.is_empty()).then_some(line));
        }
        let (used, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        if line.len() + used > MAX_LINE_LEN {
            return Err(SmtpError::Protocol(format!(
                "SMTP reply line exceeds {MAX_LINE_LEN} bytes"
            )));
        }
        line.extend_from_slice(&available[..used]);
        reader.consume(used);
        if complete {
            return Ok(Some(line));
        }
    }
}
