//! Interactive session.
//!
//! Reads one command per line from stdin and runs it against the connected
//! session. Notices published by the session (operation results, failed
//! background refreshes) are printed before each prompt. No failure ends
//! the shell; only `quit`, end of input or a shutdown signal do.

use std::future::Future;
use std::io::Write;
use std::str::FromStr;

use mintkit::token::{fetch_token_metadata, request_airdrop};
use mintkit::utils::{explorer_tx_url, parse_address};
use mintkit::{
    CreateTokenForm, CreatedToken, MintForm, MintkitError, Notice, OperationOutcome, SendForm,
    WalletSession,
};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app::App;
use crate::error::{DeskError, Result};
use crate::output::Output;

const HELP: &str = "\
commands:
  balance                              SOL balance
  tokens                               token holdings
  mintable                             tokens you can mint
  info <mint>                          mint supply, decimals, authorities
  create <name> <symbol> [decimals]    create a token (decimals default 9;
                                       quote names with spaces)
  mint <mint> <amount>                 mint tokens to yourself
  send <mint> <recipient> <amount>     send tokens
  airdrop [sol]                        request SOL from the faucet
  history                              actions taken this session
  refresh                              refresh balance and holdings now
  connect | disconnect                 wallet connection
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    Help,
    Balance,
    Tokens,
    Mintable,
    Info(String),
    Create {
        name: String,
        symbol: String,
        decimals: Option<u8>,
    },
    Mint {
        mint: String,
        amount: String,
    },
    Send {
        mint: String,
        recipient: String,
        amount: String,
    },
    Airdrop(Option<String>),
    History,
    Refresh,
    Connect,
    Disconnect,
    Quit,
}

fn usage(text: &str) -> DeskError {
    DeskError::Input(format!("usage: {text}"))
}

/// Split on whitespace, keeping double-quoted text (`"My First Token"`) as
/// one word.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                word.push(c);
                in_word = true;
            }
        }
    }
    if quoted {
        return Err(DeskError::Input("unterminated quote".into()));
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

impl FromStr for ShellCommand {
    type Err = DeskError;

    fn from_str(line: &str) -> Result<Self> {
        let words = split_words(line)?;
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let Some((&head, args)) = words.split_first() else {
            return Ok(ShellCommand::Empty);
        };

        let command = match (head.to_ascii_lowercase().as_str(), args) {
            ("help" | "?", _) => ShellCommand::Help,
            ("balance", []) => ShellCommand::Balance,
            ("tokens", []) => ShellCommand::Tokens,
            ("mintable", []) => ShellCommand::Mintable,
            ("info", [mint]) => ShellCommand::Info(mint.to_string()),
            ("info", _) => return Err(usage("info <mint>")),
            ("create", [name, symbol, rest @ ..]) if rest.len() <= 1 => {
                let decimals = rest
                    .first()
                    .map(|d| {
                        d.parse::<u8>()
                            .map_err(|_| DeskError::Input(format!("bad decimals: {d}")))
                    })
                    .transpose()?;
                ShellCommand::Create {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    decimals,
                }
            }
            ("create", _) => return Err(usage("create <name> <symbol> [decimals]")),
            ("mint", [mint, amount]) => ShellCommand::Mint {
                mint: mint.to_string(),
                amount: amount.to_string(),
            },
            ("mint", _) => return Err(usage("mint <mint> <amount>")),
            ("send", [mint, recipient, amount]) => ShellCommand::Send {
                mint: mint.to_string(),
                recipient: recipient.to_string(),
                amount: amount.to_string(),
            },
            ("send", _) => return Err(usage("send <mint> <recipient> <amount>")),
            ("airdrop", []) => ShellCommand::Airdrop(None),
            ("airdrop", [sol]) => ShellCommand::Airdrop(Some(sol.to_string())),
            ("history", []) => ShellCommand::History,
            ("refresh", []) => ShellCommand::Refresh,
            ("connect", []) => ShellCommand::Connect,
            ("disconnect", []) => ShellCommand::Disconnect,
            ("quit" | "exit" | "q", _) => ShellCommand::Quit,
            (other, _) => {
                return Err(DeskError::Input(format!(
                    "unknown command `{other}` (try `help`)"
                )))
            }
        };
        Ok(command)
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Publish `result`'s error as a notice, for calls that don't do so themselves.
fn notify_err<T>(session: &WalletSession, result: mintkit::Result<T>) -> Result<T> {
    if let Err(e) = &result {
        session.notify(Notice::error(e.to_string()));
    }
    Ok(result?)
}

fn drain_notices<W: Write>(
    notices: &mut broadcast::Receiver<Notice>,
    out: &mut Output<W>,
) -> Result<()> {
    loop {
        match notices.try_recv() {
            Ok(notice) => out.notice(&notice)?,
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "notices dropped"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

/// Print the new token, then persist its label.
async fn show_created<W: Write>(
    out: &mut Output<W>,
    created: CreatedToken,
    save: impl Future<Output = Result<()>>,
) -> Result<()> {
    out.outcome(&OperationOutcome::Created(created))?;
    save.await
}

async fn execute<W: Write>(app: &App, out: &mut Output<W>, command: ShellCommand) -> Result<Flow> {
    let session = &app.session;
    match command {
        ShellCommand::Empty => {}
        ShellCommand::Help => out.text(HELP)?,
        ShellCommand::Quit => return Ok(Flow::Quit),

        ShellCommand::Balance => {
            let snapshot = session.snapshot().await;
            match snapshot.identity {
                Some(identity) => out.balance(&identity, snapshot.balance)?,
                None => out.text("not connected")?,
            }
        }
        ShellCommand::Tokens => out.holdings(&session.holdings().await)?,
        ShellCommand::Mintable => {
            let mintable = notify_err(session, app.desk.mintable_tokens().await)?;
            out.holdings(&mintable)?;
        }
        ShellCommand::Info(mint) => {
            let mint = notify_err(session, parse_address(&mint))?;
            match fetch_token_metadata(session.chain(), &mint).await {
                Some(metadata) => out.metadata(&metadata)?,
                None => session.notify(Notice::error(format!("{mint} is not a token mint"))),
            }
        }

        ShellCommand::Create {
            name,
            symbol,
            decimals,
        } => {
            let created = app
                .desk
                .create(CreateTokenForm {
                    name,
                    symbol,
                    decimals,
                })
                .await?;
            show_created(out, created, app.save_labels()).await?;
        }
        ShellCommand::Mint { mint, amount } => {
            let receipt = app.desk.mint(MintForm { mint, amount }).await?;
            out.outcome(&OperationOutcome::Minted(receipt))?;
        }
        ShellCommand::Send {
            mint,
            recipient,
            amount,
        } => {
            let receipt = app
                .desk
                .send(SendForm {
                    mint,
                    recipient,
                    amount,
                })
                .await?;
            out.outcome(&OperationOutcome::Sent(receipt))?;
        }

        ShellCommand::Airdrop(sol) => {
            let raw = sol.unwrap_or_else(|| "1".to_string());
            let sol = Decimal::from_str(&raw)
                .map_err(|e| DeskError::Input(format!("bad amount {raw}: {e}")))?;
            let identity = notify_err(
                session,
                session
                    .identity()
                    .await
                    .ok_or(MintkitError::WalletNotConnected),
            )?;
            let signature = notify_err(
                session,
                request_airdrop(session.chain(), &identity, sol, session.cluster()).await,
            )?;
            session.notify(Notice::success(format!("Airdropped {sol} SOL")));
            // Failure is reported as a notice.
            let _ = session.refresh_balance().await;
            out.airdrop(sol, &explorer_tx_url(&signature, session.cluster()))?;
        }

        ShellCommand::History => out.history(&session.history().await)?,
        ShellCommand::Refresh => {
            let (balance, holdings) =
                tokio::join!(session.refresh_balance(), session.refresh_holdings());
            balance?;
            holdings?;
        }
        ShellCommand::Connect => {
            if session.is_connected().await {
                out.text("already connected")?;
            } else {
                let identity = session.connect().await?;
                out.identity(&identity, session.wallet().name())?;
            }
        }
        ShellCommand::Disconnect => {
            app.save_labels().await?;
            session.disconnect().await?;
            out.text("disconnected")?;
        }
    }
    Ok(Flow::Continue)
}

pub async fn run(app: &App, json: bool, cancel: CancellationToken) -> Result<()> {
    let mut out = Output::new(std::io::stdout(), json);
    let mut notices = app.session.subscribe_notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(identity) = app.session.identity().await {
        out.identity(&identity, app.session.wallet().name())?;
    }
    if !json {
        out.text("type `help` for commands")?;
    }

    loop {
        drain_notices(&mut notices, &mut out)?;
        if !json {
            print!("> ");
            std::io::stdout().flush()?;
        }

        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("end of input");
            break;
        };

        let result = match line.parse::<ShellCommand>() {
            Ok(command) => execute(app, &mut out, command).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            // Library failures were already published as notices.
            Err(DeskError::Mintkit(e)) => debug!(error = %e, "command failed"),
            Err(e) => out.notice(&Notice::error(e.to_string()))?,
        }
    }

    drain_notices(&mut notices, &mut out)?;
    Ok(())
}
