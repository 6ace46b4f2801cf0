use clap::Parser;
use ledger_sync::args::{Args, Command};
use ledger_sync::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().ledger_home().path();

    // This allows for running the program without hitting GitHub. When LEDGER_SYNC_IN_TEST_MODE
    // is set and non-empty, the mode will be Mode::Test, otherwise it will be Mode::GitHub.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.repo_url(), init_args.token())
                .await?
                .print()
        }

        Command::Show(show_args) => {
            let config = Config::load(home).await?;
            if show_args.all() {
                commands::show_all(config, mode).await?.print()
            } else {
                commands::show_month(config, mode, show_args.month())
                    .await?
                    .print()
            }
        }

        Command::Set(set_args) => {
            let config = Config::load(home).await?;
            commands::set(config, mode, set_args.clone()).await?.print()
        }

        Command::Payment(payment_args) => {
            let config = Config::load(home).await?;
            commands::payment(config, mode, payment_args.action().clone())
                .await?
                .print()
        }

        Command::Clone(clone_args) => {
            let config = Config::load(home).await?;
            commands::clone(config, mode, clone_args.clone())
                .await?
                .print()
        }

        Command::Copy(copy_args) => {
            let config = Config::load(home).await?;
            commands::copy(config, mode, copy_args.clone()).await?.print()
        }

        Command::Transfer(transfer_args) => {
            let config = Config::load(home).await?;
            commands::transfer(config, mode, transfer_args.clone())
                .await?
                .print()
        }

        Command::Clear(month_args) => {
            let config = Config::load(home).await?;
            commands::clear(config, mode, month_args.month())
                .await?
                .print()
        }

        Command::Pull => commands::pull(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::Serve(serve_args) => {
            let config = Config::load(home).await?;
            commands::serve(config, mode, serve_args.addr())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
