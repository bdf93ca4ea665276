//! modem-watch binary: CLI surface, log setup, and the poll loop runner.

use clap::Parser;
use modem_watch::{Config, Error, PollLoop, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Monitor the signal quality of a cable modem
#[derive(Debug, Parser)]
#[command(name = "modem-watch", version, about)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File name of the data store (overrides the config file)
    #[arg(short, long)]
    datafile: Option<PathBuf>,

    /// File to read the modem password from (first line)
    #[arg(short, long)]
    passfile: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Display only errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }

    /// Assemble the effective configuration from file, flags, and the
    /// password source
    fn build_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(datafile) = &self.datafile {
            config.persistence.datafile = datafile.clone();
        }

        if let Some(passfile) = &self.passfile {
            let content = std::fs::read_to_string(passfile)?;
            config.modem.password = content
                .lines()
                .next()
                .unwrap_or_default()
                .trim_end()
                .to_string();
        } else if let Ok(password) = std::env::var("MODEM_PASSWORD") {
            config.modem.password = password;
        }

        if config.modem.password.is_empty() {
            return Err(Error::Config {
                message: "no modem password: use --passfile or set MODEM_PASSWORD".to_string(),
                key: Some("modem.password".to_string()),
            });
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .init();

    if let Err(e) = run(&cli).await {
        tracing::error!(error = %e, "modem-watch exiting");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.build_config()?;
    let cancel = CancellationToken::new();
    let poller = PollLoop::new(&config, cancel.clone())?;
    modem_watch::run_with_shutdown(poller, cancel).await
}
