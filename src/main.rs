mod app;
mod cli;
mod error;
mod output;
mod shell;
mod watch;

use std::str::FromStr;

use clap::Parser;
use cli::Command;
use mintkit::token::{fetch_token_metadata, request_airdrop};
use mintkit::utils::{explorer_tx_url, parse_address};
use mintkit::{CreateTokenForm, MintForm, OperationOutcome, SendForm};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::{DeskError, Result};
use crate::output::Output;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Shared cancellation token + signal handlers.
    let cancel = setup_signal_handlers();

    if let Err(e) = run(cli, cancel).await {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli, cancel: CancellationToken) -> Result<()> {
    let app = App::build(&cli)?;
    let mut out = Output::new(std::io::stdout(), cli.json);

    // Mint metadata needs no wallet connection.
    if let Command::Info(args) = &cli.command {
        let mint = parse_address(&args.mint)?;
        let metadata = fetch_token_metadata(app.session.chain(), &mint)
            .await
            .ok_or_else(|| DeskError::Input(format!("{mint} is not a token mint")))?;
        return out.metadata(&metadata);
    }

    let identity = app.start().await?;
    info!(wallet = app.session.wallet().name(), %identity, "wallet connected");

    let result = match cli.command {
        Command::Info(_) => Ok(()),
        Command::Balance => out.balance(&identity, app.session.balance().await),
        Command::Tokens => out.holdings(&app.session.holdings().await),
        Command::Create(args) => {
            let form = CreateTokenForm {
                name: args.name,
                symbol: args.symbol,
                decimals: args.decimals,
            };
            match app.desk.create(form).await {
                Ok(created) => out.outcome(&OperationOutcome::Created(created)),
                Err(e) => Err(e.into()),
            }
        }
        Command::Mint(args) => {
            let form = MintForm {
                mint: args.mint,
                amount: args.amount,
            };
            match app.desk.mint(form).await {
                Ok(receipt) => out.outcome(&OperationOutcome::Minted(receipt)),
                Err(e) => Err(e.into()),
            }
        }
        Command::Send(args) => {
            let form = SendForm {
                mint: args.mint,
                recipient: args.recipient,
                amount: args.amount,
            };
            match app.desk.send(form).await {
                Ok(receipt) => out.outcome(&OperationOutcome::Sent(receipt)),
                Err(e) => Err(e.into()),
            }
        }
        Command::Airdrop(args) => airdrop(&app, &mut out, &args.sol).await,
        Command::Watch => watch::run_watch(&app, &mut out, cancel).await,
        Command::Shell => shell::run(&app, cli.json, cancel).await,
    };

    // Labels and disconnect are best-effort once the command has run.
    if let Err(e) = app.shutdown().await {
        warn!(error = %e, "shutdown failed");
    }
    result
}

async fn airdrop<W: std::io::Write>(app: &App, out: &mut Output<W>, raw: &str) -> Result<()> {
    let sol = Decimal::from_str(raw)
        .map_err(|e| DeskError::Input(format!("bad amount {raw}: {e}")))?;
    let session = &app.session;
    let identity = session
        .identity()
        .await
        .ok_or(mintkit::MintkitError::WalletNotConnected)?;
    let signature = request_airdrop(session.chain(), &identity, sol, session.cluster()).await?;
    out.airdrop(sol, &explorer_tx_url(&signature, session.cluster()))
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("received SIGTERM, shutting down");
                    cancel_clone.cancel();
                }
                Err(e) => warn!(error = %e, "failed to register SIGTERM handler"),
            }
        });
    }

    cancel
}
