//! glossa entry point.

use std::process::ExitCode;

use glossa_cli::args::{Invocation, USAGE};
use glossa_cli::config::CliConfig;
use glossa_cli::error::CliError;
use glossa_cli::{lookup, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(reason)) => {
            eprintln!("glossa: {}\n{}", reason, USAGE);
            ExitCode::from(2)
        }
        Err(error) => {
            eprintln!("glossa: {}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), CliError> {
    let invocation = Invocation::parse(std::env::args().skip(1))?;
    if invocation.help {
        println!("{}", USAGE);
        return Ok(());
    }
    let config = CliConfig::load(invocation.config_path.as_deref())?;
    telemetry::init(config.log_format);
    tracing::debug!(endpoint = %config.endpoint, uris = invocation.uris.len(), "resolving");

    let result = lookup(&config, &invocation.uris).await?;
    println!("{}", serde_json::to_string_pretty(&result.labels)?);
    if invocation.inspect {
        eprintln!("{}", serde_json::to_string_pretty(&result.inspection)?);
    }
    Ok(())
}
