use std::io::Write;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::App;
use crate::error::Result;
use crate::output::Output;

/// Print the session's balance and holdings once per refresh interval, and
/// every notice as it arrives, until cancelled.
pub async fn run_watch<W: Write>(
    app: &App,
    out: &mut Output<W>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut notices = app.session.subscribe_notices();
    let mut ticker = interval(app.session.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval = ?app.session.refresh_interval(), "watching");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("watch stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                let snapshot = app.session.snapshot().await;
                if let Some(identity) = snapshot.identity {
                    out.balance(&identity, snapshot.balance)?;
                }
                out.holdings(&snapshot.holdings)?;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => out.notice(&notice)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notices dropped"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
