mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use livsync_core::{CoreError, Coordinator};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        // No hub connection needed
        Command::Config(args) => commands::config_cmd::handle(args, &global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "livsync", &mut std::io::stdout());
            Ok(())
        }

        // Long-running: owns its coordinator and polls in the background
        Command::Watch(args) => commands::watch::handle(&args, &global).await,

        cmd => {
            let coordinator_config = config::build_coordinator_config(&global)?;
            tracing::debug!(command = ?cmd, "dispatching command");

            Coordinator::oneshot(coordinator_config, |coordinator| async move {
                Ok::<_, CoreError>(commands::dispatch(cmd, &coordinator, &global).await)
            })
            .await?
        }
    }
}
