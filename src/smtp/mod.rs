//! SMTP deliverability probe.
//!
//! [`probe`] runs a minimal dialogue (`HELO`, `MAIL FROM`, `RCPT TO`, `QUIT`)
//! against each MX host in preference order and stops at the first host that
//! accepts the recipient. `DATA` is never sent. Per-host failures are folded
//! into [`ProbeOutcome`]s; the loop only ends on acceptance, exhaustion or an
//! expired deadline.

mod connector;
mod error;
mod options;
mod session;
mod types;

pub use connector::{HostConnector, TcpConnector};
pub use error::SmtpError;
pub use options::ProbeOptions;
pub use types::{HandshakeStage, ProbeOutcome, ProbeResult, ProbeStatus, ResponseClass, SmtpReply};

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::mx::MxRecord;
use session::{SmtpSession, deadline_passed, expect_positive};

/// Probes `address` against `hosts` (already ordered by preference) using a
/// TCP connector on `options.port` backed by the system resolver.
/// `options.deadline` starts counting now.
pub fn probe(address: &str, hosts: &[MxRecord], options: &ProbeOptions) -> ProbeResult {
    let deadline = options.deadline.map(|budget| Instant::now() + budget);
    probe_with(&TcpConnector::system(options.port), address, hosts, options, deadline)
}

/// Identical to [`probe`], with an explicit connector and absolute deadline.
pub fn probe_with<C>(
    connector: &C,
    address: &str,
    hosts: &[MxRecord],
    options: &ProbeOptions,
    deadline: Option<Instant>,
) -> ProbeResult
where
    C: HostConnector + ?Sized,
{
    let mut attempts = Vec::new();
    for record in hosts.iter().take(options.max_hosts.max(1)) {
        let outcome = probe_host(connector, address, &record.exchange, options, deadline);
        if outcome.is_accepted() {
            info!(
                host = %outcome.host,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "recipient accepted"
            );
            attempts.push(outcome);
            return ProbeResult {
                status: ProbeStatus::Accepted,
                attempts,
            };
        }

        warn!(
            host = %outcome.host,
            stage = %outcome.stage,
            detail = %outcome.detail(),
            "SMTP attempt failed"
        );
        let connection_error = outcome.class == ResponseClass::ConnectionError;
        attempts.push(outcome);
        if connection_error && deadline_passed(deadline) {
            warn!(tried = attempts.len(), "probe deadline exceeded");
            return ProbeResult {
                status: ProbeStatus::DeadlineExceeded,
                attempts,
            };
        }
    }

    ProbeResult {
        status: ProbeStatus::Exhausted,
        attempts,
    }
}

fn probe_host<C>(
    connector: &C,
    address: &str,
    host: &str,
    options: &ProbeOptions,
    deadline: Option<Instant>,
) -> ProbeOutcome
where
    C: HostConnector + ?Sized,
{
    let started = Instant::now();
    let mut stage = HandshakeStage::Connect;
    match handshake(connector, address, host, options, deadline, started, &mut stage) {
        Ok((reply, elapsed)) => ProbeOutcome::from_rcpt_reply(host, reply, elapsed),
        Err(err) => ProbeOutcome::connection_error(host, stage, &err, started.elapsed()),
    }
}

fn handshake<C>(
    connector: &C,
    address: &str,
    host: &str,
    options: &ProbeOptions,
    deadline: Option<Instant>,
    started: Instant,
    stage: &mut HandshakeStage,
) -> Result<(SmtpReply, Duration), SmtpError>
where
    C: HostConnector + ?Sized,
{
    let (mut session, _peer) = SmtpSession::connect(
        connector,
        host,
        options.connect_timeout,
        options.command_timeout,
        deadline,
    )?;

    *stage = HandshakeStage::Greeting;
    let banner = session.read_reply()?;
    expect_positive(HandshakeStage::Greeting, banner)?;

    *stage = HandshakeStage::Helo;
    greet(&mut session, options)?;

    *stage = HandshakeStage::MailFrom;
    let reply = session.command(&options.envelope_command())?;
    expect_positive(HandshakeStage::MailFrom, reply)?;

    *stage = HandshakeStage::RcptTo;
    let rcpt = session.command(&format!("RCPT TO:<{address}>"))?;
    let elapsed = started.elapsed();

    session.quit();
    Ok((rcpt, elapsed))
}

fn greet(session: &mut SmtpSession, options: &ProbeOptions) -> Result<(), SmtpError> {
    let reply = session.command(&options.greeting_command())?;
    if reply.is_positive_completion() {
        return Ok(());
    }
    if options.use_ehlo {
        let helo = session.command(&format!("HELO {}", options.helo_name))?;
        expect_positive(HandshakeStage::Helo, helo)?;
        return Ok(());
    }
    Err(SmtpError::rejected(HandshakeStage::Helo, &reply))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{self, BufRead, BufReader, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::thread;

    /// Routes MX names to loopback ports; unknown names are refused.
    pub(crate) struct LoopbackConnector {
        ports: HashMap<String, u16>,
    }

    impl LoopbackConnector {
        pub(crate) fn new<I>(routes: I) -> Self
        where
            I: IntoIterator<Item = (&'static str, u16)>,
        {
            Self {
                ports: routes
                    .into_iter()
                    .map(|(host, port)| (host.to_string(), port))
                    .collect(),
            }
        }

        pub(crate) fn refusing_all() -> Self {
            Self {
                ports: HashMap::new(),
            }
        }
    }

    impl HostConnector for LoopbackConnector {
        fn connect(
            &self,
            host: &str,
            timeout: Duration,
            deadline: Option<Instant>,
        ) -> Result<(TcpStream, SocketAddr), SmtpError> {
            let Some(port) = self.ports.get(host) else {
                return Err(SmtpError::connect(
                    host,
                    io::Error::new(io::ErrorKind::ConnectionRefused, "no route in test"),
                ));
            };
            let addr = SocketAddr::from(([127, 0, 0, 1], *port));
            super::connector::connect_any(host, &[addr], Instant::now() + timeout, deadline)
        }
    }

    pub(crate) fn spawn_mock_server(
        script: Vec<(&'static str, &'static str)>,
    ) -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("addr").port();
        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            ready_tx.send(()).ok();
            if let Ok((mut stream, _)) = listener.accept() {
                handle_session(&mut stream, script).expect("mock session");
            }
        });
        ready_rx.recv().expect("server ready");
        (port, handle)
    }

    fn handle_session(
        stream: &mut TcpStream,
        script: Vec<(&'static str, &'static str)>,
    ) -> io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        stream.write_all(b"220 mock.smtp.test ESMTP\r\n")?;
        stream.flush()?;
        for (expected, response) in script {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            assert!(
                line.starts_with(expected),
                "expected command starting with '{expected}', got '{line}'"
            );
            stream.write_all(response.as_bytes())?;
            stream.flush()?;
        }
        Ok(())
    }

    /// Serveur qui envoie `chunk` toutes les `every` sans jamais terminer sa
    /// réponse; s'arrête quand le client ferme la connexion.
    fn spawn_dripping_server(
        chunk: &'static [u8],
        every: Duration,
    ) -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind dripping server");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            for _ in 0..200 {
                if stream.write_all(chunk).and_then(|()| stream.flush()).is_err() {
                    return;
                }
                thread::sleep(every);
            }
        });
        (port, handle)
    }

    pub(crate) fn accepting_script() -> Vec<(&'static str, &'static str)> {
        vec![
            ("HELO example.com", "250 mock.example\r\n"),
            ("MAIL FROM:<test@example.com>", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:<", "250 2.1.5 Ok\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ]
    }

    pub(crate) fn rejecting_script(
        response: &'static str,
    ) -> Vec<(&'static str, &'static str)> {
        vec![
            ("HELO", "250 mock.example\r\n"),
            ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:", response),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ]
    }

    pub(crate) fn fast_options() -> ProbeOptions {
        ProbeOptions {
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_millis(300),
            ..ProbeOptions::default()
        }
    }

    fn hosts(names: &[&str]) -> Vec<MxRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| MxRecord::new(i as u16 * 10, *name))
            .collect()
    }

    #[test]
    fn first_accepting_host_wins() {
        let (port, handle) = spawn_mock_server(accepting_script());
        let connector = LoopbackConnector::new([("mx-a", port)]);
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a", "mx-b"]),
            &fast_options(),
            None,
        );
        assert_eq!(result.status, ProbeStatus::Accepted);
        assert_eq!(result.attempts.len(), 1);
        let accepted = result.accepted().expect("accepted outcome");
        assert_eq!(accepted.code, Some(250));
        assert_eq!(accepted.message.as_deref(), Some("2.1.5 Ok"));
        handle.join().expect("server thread");
    }

    #[test]
    fn silent_host_falls_back_to_next() {
        // accepte au niveau TCP (backlog) mais n'envoie jamais de bannière
        let silent = TcpListener::bind("127.0.0.1:0").expect("bind silent");
        let silent_port = silent.local_addr().expect("addr").port();
        let (port, handle) = spawn_mock_server(accepting_script());
        let connector = LoopbackConnector::new([("mx-a", silent_port), ("mx-b", port)]);

        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a", "mx-b"]),
            &fast_options(),
            None,
        );

        assert_eq!(result.status, ProbeStatus::Accepted);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].class, ResponseClass::ConnectionError);
        assert_eq!(result.attempts[0].stage, HandshakeStage::Greeting);
        assert_eq!(result.accepted().map(|a| a.host.as_str()), Some("mx-b"));
        handle.join().expect("server thread");
        drop(silent);
    }

    #[test]
    fn all_hosts_rejecting_exhausts_with_last_reply() {
        let (port_a, handle_a) = spawn_mock_server(rejecting_script("550 5.1.1 No such user\r\n"));
        let (port_b, handle_b) =
            spawn_mock_server(rejecting_script("550 5.1.1 Mailbox unavailable\r\n"));
        let connector = LoopbackConnector::new([("mx-a", port_a), ("mx-b", port_b)]);

        let result = probe_with(
            &connector,
            "ghost@example.com",
            &hosts(&["mx-a", "mx-b"]),
            &fast_options(),
            None,
        );

        assert_eq!(result.status, ProbeStatus::Exhausted);
        assert!(result.any_permanent_rejection());
        let last = result.last_failure().expect("last failure");
        assert_eq!(last.host, "mx-b");
        assert_eq!(last.detail(), "550 5.1.1 Mailbox unavailable");
        handle_a.join().expect("server a");
        handle_b.join().expect("server b");
    }

    #[test]
    fn temporary_failure_is_not_permanent() {
        let (port, handle) = spawn_mock_server(rejecting_script("451 4.7.1 Greylisted\r\n"));
        let connector = LoopbackConnector::new([("mx-a", port)]);
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a"]),
            &fast_options(),
            None,
        );
        assert_eq!(result.status, ProbeStatus::Exhausted);
        assert_eq!(result.attempts[0].class, ResponseClass::TemporaryFailure);
        assert!(!result.any_permanent_rejection());
        handle.join().expect("server thread");
    }

    #[test]
    fn sender_rejection_is_a_host_failure() {
        let (port, handle) = spawn_mock_server(vec![
            ("HELO", "250 mock.example\r\n"),
            ("MAIL FROM:", "553 5.7.1 Sender rejected\r\n"),
        ]);
        let connector = LoopbackConnector::new([("mx-a", port)]);
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a"]),
            &fast_options(),
            None,
        );
        let attempt = &result.attempts[0];
        assert_eq!(attempt.class, ResponseClass::ConnectionError);
        assert_eq!(attempt.stage, HandshakeStage::MailFrom);
        assert_eq!(attempt.code, Some(553));
        assert!(!result.any_permanent_rejection());
        handle.join().expect("server thread");
    }

    #[test]
    fn ehlo_refusal_falls_back_to_helo() {
        let (port, handle) = spawn_mock_server(vec![
            ("EHLO example.com", "502 5.5.1 Unrecognized command\r\n"),
            ("HELO example.com", "250 mock.example\r\n"),
            ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:<user@example.com>", "250 2.1.5 Ok\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ]);
        let connector = LoopbackConnector::new([("mx-a", port)]);
        let options = ProbeOptions {
            use_ehlo: true,
            ..fast_options()
        };
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a"]),
            &options,
            None,
        );
        assert_eq!(result.status, ProbeStatus::Accepted);
        handle.join().expect("server thread");
    }

    #[test]
    fn unreachable_hosts_exhaust_without_reply() {
        let connector = LoopbackConnector::refusing_all();
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a", "mx-b", "mx-c"]),
            &fast_options(),
            None,
        );
        assert_eq!(result.status, ProbeStatus::Exhausted);
        assert_eq!(result.attempts.len(), 3);
        assert!(
            result
                .attempts
                .iter()
                .all(|a| a.class == ResponseClass::ConnectionError && a.stage == HandshakeStage::Connect)
        );
    }

    #[test]
    fn max_hosts_limits_attempts() {
        let connector = LoopbackConnector::refusing_all();
        let options = ProbeOptions {
            max_hosts: 1,
            ..fast_options()
        };
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a", "mx-b"]),
            &options,
            None,
        );
        assert_eq!(result.attempts.len(), 1);
    }

    fn assert_drip_bounded(chunk: &'static [u8]) {
        let (port, handle) = spawn_dripping_server(chunk, Duration::from_millis(50));
        let connector = LoopbackConnector::new([("mx-a", port)]);
        let options = ProbeOptions {
            command_timeout: Duration::from_secs(5),
            ..fast_options()
        };
        let started = Instant::now();
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a", "mx-b"]),
            &options,
            Some(started + Duration::from_millis(300)),
        );
        let took = started.elapsed();

        assert_eq!(result.status, ProbeStatus::DeadlineExceeded);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].stage, HandshakeStage::Greeting);
        assert!(took < Duration::from_secs(1), "took {took:?}");
        handle.join().expect("server thread");
    }

    #[test]
    fn slow_continuation_lines_respect_deadline() {
        assert_drip_bounded(b"220-still talking\r\n");
    }

    #[test]
    fn unterminated_line_respects_deadline() {
        assert_drip_bounded(b"2");
    }

    #[test]
    fn expired_deadline_stops_probe() {
        let silent = TcpListener::bind("127.0.0.1:0").expect("bind silent");
        let silent_port = silent.local_addr().expect("addr").port();
        let connector = LoopbackConnector::new([("mx-a", silent_port)]);
        let options = ProbeOptions {
            command_timeout: Duration::from_secs(5),
            ..fast_options()
        };
        let started = Instant::now();
        let result = probe_with(
            &connector,
            "user@example.com",
            &hosts(&["mx-a", "mx-b"]),
            &options,
            Some(started + Duration::from_millis(200)),
        );
        assert_eq!(result.status, ProbeStatus::DeadlineExceeded);
        assert_eq!(result.attempts.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(4));
        drop(silent);
    }
}
