mod args;
mod logging;
mod output;

use anyhow::{Context, Result};
use mailprobe_lib::{Verifier, validate_syntax};
use tracing::{error, info};

use args::{Cli, Commands, checked_input};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.log_file.as_deref())?;
    let policy = cli.syntax_policy()?;
    info!(blocked_domains = policy.len(), "blocklist loaded");

    // codes de sortie : 0 OK, 2 invalide, 3 indéterminé, 1 fatal
    let code = match &cli.cmd {
        Commands::Validate { email, format } => {
            let email = match checked_input(email) {
                Ok(email) => email,
                Err(err) => {
                    output::write_error(*format, &err.to_string())?;
                    std::process::exit(2);
                }
            };
            let report = validate_syntax(email, &policy);
            output::write_validation(email, &report, *format)?;
            if report.ok { 0 } else { 2 }
        }
        Commands::Verify(verify) => {
            let email = match checked_input(&verify.email) {
                Ok(email) => email,
                Err(err) => {
                    output::write_error(verify.format, &err.to_string())?;
                    std::process::exit(2);
                }
            };
            let verifier = Verifier::new(verify.options(policy))
                .inspect_err(|err| error!(error = %err, "verifier setup failed"))
                .context("build verifier")?;
            let result = verifier.verify(email);
            output::write_verification(&result, verify.format)?;
            output::exit_code(result.verdict)
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
