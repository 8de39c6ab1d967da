use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mailprobe_lib::{ProbeOptions, ResolverOptions, SyntaxPolicy, VerifyOptions};

/// Longueur maximale acceptée avant même d'appeler le moteur.
pub const MAX_INPUT_LEN: usize = 254;

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Vérifie la délivrabilité d'une adresse e-mail")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// domaines jetables supplémentaires (un par ligne, `#` pour commenter)
    #[arg(long, global = true)]
    pub blocklist: Option<PathBuf>,

    /// n'utilise pas la liste intégrée de domaines jetables
    #[arg(long, global = true)]
    pub no_default_blocklist: bool,

    /// écrit les journaux dans ce fichier plutôt que sur stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// augmente la verbosité (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// n'affiche que les erreurs dans les journaux
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// syntaxe, résolution MX puis sonde SMTP
    Verify(VerifyArgs),
    /// contrôle de syntaxe uniquement, sans accès réseau
    Validate {
        email: String,
        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,
    },
}

#[derive(Args)]
pub struct VerifyArgs {
    /// adresse e-mail à vérifier
    pub email: String,

    #[arg(long, value_enum, default_value_t = Format::Human)]
    pub format: Format,

    /// nom annoncé dans HELO/EHLO
    #[arg(long)]
    pub helo: Option<String>,

    /// enveloppe MAIL FROM (fictive par défaut)
    #[arg(long = "from")]
    pub mail_from: Option<String>,

    /// port SMTP
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// timeout connexion/commande SMTP (ms)
    #[arg(long = "timeout-ms", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// timeout de la résolution DNS (ms)
    #[arg(long = "dns-timeout-ms", default_value_t = 3_000)]
    pub dns_timeout_ms: u64,

    /// budget global de la vérification (ms)
    #[arg(long = "deadline-ms")]
    pub deadline_ms: Option<u64>,

    /// nombre maximum d'MX interrogés
    #[arg(long = "max-mx", default_value_t = 5)]
    pub max_mx: usize,

    /// salue avec EHLO (repli sur HELO si refusé)
    #[arg(long)]
    pub ehlo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn syntax_policy(&self) -> Result<SyntaxPolicy> {
        let policy = if self.no_default_blocklist {
            SyntaxPolicy::empty()
        } else {
            SyntaxPolicy::default()
        };
        let Some(path) = &self.blocklist else {
            return Ok(policy);
        };
        let file = File::open(path)
            .with_context(|| format!("open blocklist {}", path.display()))?;
        policy
            .with_blocklist_reader(BufReader::new(file))
            .with_context(|| format!("read blocklist {}", path.display()))
    }
}

impl VerifyArgs {
    pub fn options(&self, syntax: SyntaxPolicy) -> VerifyOptions {
        let mut probe = ProbeOptions {
            port: self.port,
            connect_timeout: Duration::from_millis(self.timeout_ms),
            command_timeout: Duration::from_millis(self.timeout_ms),
            max_hosts: self.max_mx,
            use_ehlo: self.ehlo,
            deadline: self.deadline_ms.map(Duration::from_millis),
            ..ProbeOptions::default()
        };
        if let Some(helo) = &self.helo {
            probe.helo_name = helo.clone();
        }
        if let Some(from) = &self.mail_from {
            probe.mail_from = from.clone();
        }

        VerifyOptions {
            syntax,
            resolver: ResolverOptions {
                timeout: Duration::from_millis(self.dns_timeout_ms),
                ..ResolverOptions::default()
            },
            probe,
        }
    }
}

/// Rejette une saisie vide ou trop longue avant tout appel au moteur.
pub fn checked_input(email: &str) -> Result<&str> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        bail!("email is required");
    }
    let len = trimmed.chars().count();
    if len > MAX_INPUT_LEN {
        bail!("email too long ({len} > {MAX_INPUT_LEN})");
    }
    Ok(trimmed)
}
