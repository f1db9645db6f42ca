//! Nitella CLI entry point

use clap::Parser;
use nitella_cli::{Cli, ExitCode, OutputFormatter};
use nitella_core::config::{CliOverrides, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Config error: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    let overrides = CliOverrides {
        verbose: cli.verbose,
        debug: cli.debug,
        data_dir: cli.data_dir.clone(),
    };
    let config = config.with_overrides(&overrides);

    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return ExitCode::InvalidInput.to_exit_code();
    }

    let formatter = OutputFormatter::new(cli.output, cli.verbose);
    match cli.execute_with_config(config).await {
        Ok(code) => code.to_exit_code(),
        Err(e) => {
            let code = ExitCode::for_error(&e);
            let message = formatter.format_error_with_code(&e, code);
            if !message.is_empty() {
                eprintln!("{message}");
            }
            code.to_exit_code()
        }
    }
}
