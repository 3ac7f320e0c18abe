//! Wallet session state.
//!
//! A [`WalletSession`] owns the connected identity, its native balance, its
//! token holdings and the action history. While connected, two independent
//! background tasks refresh the balance and the holdings on a fixed
//! interval; both hang off a [`CancellationToken`] that `disconnect` (or
//! dropping the session) cancels.
//!
//! Every connect/disconnect bumps an epoch. A refresh that started under an
//! older epoch discards its result instead of writing it.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::config::{Cluster, MintkitConfig};
use crate::error::{MintkitError, Result};
use crate::labels::LabelBook;
use crate::token::try_fetch_wallet_tokens;
use crate::types::{ActionRecord, Notice, NoticeLevel, TokenHolding, TokenLabel};
use crate::utils::{format_address, lamports_to_sol};
use crate::wallet::WalletAdapter;

/// Capacity of the notice broadcast channel.
const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Point-in-time copy of the session's observable state.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub identity: Option<Pubkey>,
    pub connectivity: Connectivity,
    /// Native balance in SOL.
    pub balance: Decimal,
    pub holdings: Vec<TokenHolding>,
    /// True while any refresh is in flight.
    pub loading: bool,
    /// Newest first.
    pub history: Vec<ActionRecord>,
}

#[derive(Default)]
struct SessionState {
    identity: Option<Pubkey>,
    connectivity: Connectivity,
    balance: Decimal,
    holdings: Vec<TokenHolding>,
    history: Vec<ActionRecord>,
    in_flight: u32,
    epoch: u64,
    labels: LabelBook,
    refresh_token: Option<CancellationToken>,
}

impl SessionState {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.connectivity == Connectivity::Connected
    }

    fn clear(&mut self) {
        self.identity = None;
        self.balance = Decimal::ZERO;
        self.holdings.clear();
        self.history.clear();
        self.in_flight = 0;
    }
}

#[derive(Debug, Clone, Copy)]
enum RefreshTarget {
    Balance,
    Holdings,
}

impl RefreshTarget {
    fn name(self) -> &'static str {
        match self {
            RefreshTarget::Balance => "balance",
            RefreshTarget::Holdings => "holdings",
        }
    }
}

/// State shared with the background refresh tasks.
struct Shared {
    chain: Arc<dyn ChainClient>,
    wallet: Arc<dyn WalletAdapter>,
    cluster: Cluster,
    refresh_interval: Duration,
    state: RwLock<SessionState>,
    notices: broadcast::Sender<Notice>,
    root: CancellationToken,
}

impl Shared {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => warn!(message = %notice.message, "notice"),
            _ => info!(message = %notice.message, "notice"),
        }
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }

    /// Identity and epoch if connected; marks a refresh as in flight.
    async fn begin_refresh(&self) -> Option<(Pubkey, u64)> {
        let mut st = self.state.write().await;
        if st.connectivity != Connectivity::Connected {
            return None;
        }
        let identity = st.identity?;
        st.in_flight += 1;
        Some((identity, st.epoch))
    }

    async fn end_refresh(&self, epoch: u64) {
        let mut st = self.state.write().await;
        if st.epoch == epoch {
            st.in_flight = st.in_flight.saturating_sub(1);
        }
    }

    async fn refresh_balance(&self) -> Result<()> {
        let Some((owner, epoch)) = self.begin_refresh().await else {
            return Err(MintkitError::WalletNotConnected);
        };
        let result = self.chain.get_balance(&owner).await;
        self.end_refresh(epoch).await;

        match result {
            Ok(lamports) => {
                let mut st = self.state.write().await;
                if !st.is_current(epoch) {
                    debug!("discarding balance from a previous connection");
                    return Ok(());
                }
                st.balance = lamports_to_sol(lamports);
                debug!(balance = %st.balance, "balance refreshed");
                Ok(())
            }
            Err(e) => {
                if self.state.read().await.is_current(epoch) {
                    error!(error = %e, "balance refresh failed");
                    self.notify(Notice::error("Failed to fetch wallet balance"));
                } else {
                    debug!(error = %e, "balance refresh from a previous connection failed");
                }
                Err(e)
            }
        }
    }

    async fn refresh_holdings(&self) -> Result<()> {
        let Some((owner, epoch)) = self.begin_refresh().await else {
            return Err(MintkitError::WalletNotConnected);
        };
        let result = try_fetch_wallet_tokens(self.chain.as_ref(), &owner).await;
        self.end_refresh(epoch).await;

        match result {
            Ok(mut holdings) => {
                let mut st = self.state.write().await;
                if !st.is_current(epoch) {
                    debug!("discarding holdings from a previous connection");
                    return Ok(());
                }
                st.labels.apply(&mut holdings);
                debug!(count = holdings.len(), "holdings refreshed");
                st.holdings = holdings;
                Ok(())
            }
            Err(e) => {
                if self.state.read().await.is_current(epoch) {
                    error!(error = %e, "holdings refresh failed");
                    self.notify(Notice::error("Failed to fetch token accounts"));
                } else {
                    debug!(error = %e, "holdings refresh from a previous connection failed");
                }
                Err(e)
            }
        }
    }

    async fn refresh(&self, target: RefreshTarget) -> Result<()> {
        match target {
            RefreshTarget::Balance => self.refresh_balance().await,
            RefreshTarget::Holdings => self.refresh_holdings().await,
        }
    }
}

/// Run `target`'s refresh every `period` until `cancel` fires.
///
/// The first tick is one period out; `connect` does the immediate fetch.
fn spawn_refresh_loop(
    shared: Arc<Shared>,
    target: RefreshTarget,
    period: Duration,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are already reported; retry on the next tick.
                    let _ = shared.refresh(target).await;
                }
                _ = cancel.cancelled() => {
                    debug!(refresh = target.name(), "refresh loop stopped");
                    return;
                }
            }
        }
    });
}

/// A wallet session. Share it by `Arc` with every consumer.
pub struct WalletSession {
    shared: Arc<Shared>,
}

impl WalletSession {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallet: Arc<dyn WalletAdapter>,
        config: &MintkitConfig,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                chain,
                wallet,
                cluster: config.cluster,
                refresh_interval: config.refresh_interval,
                state: RwLock::new(SessionState::default()),
                notices,
                root: CancellationToken::new(),
            }),
        }
    }

    pub fn chain(&self) -> &dyn ChainClient {
        self.shared.chain.as_ref()
    }

    pub fn wallet(&self) -> &dyn WalletAdapter {
        self.shared.wallet.as_ref()
    }

    pub fn cluster(&self) -> Cluster {
        self.shared.cluster
    }

    pub fn refresh_interval(&self) -> Duration {
        self.shared.refresh_interval
    }

    /// Connect the wallet, fetch balance and holdings, and start the refresh loops.
    pub async fn connect(&self) -> Result<Pubkey> {
        {
            let mut st = self.shared.state.write().await;
            if st.connectivity != Connectivity::Disconnected {
                return Err(MintkitError::AlreadyConnected);
            }
            st.connectivity = Connectivity::Connecting;
        }

        let identity = match self.shared.wallet.connect().await {
            Ok(identity) => identity,
            Err(e) => {
                self.shared.state.write().await.connectivity = Connectivity::Disconnected;
                self.shared
                    .notify(Notice::error(format!("Failed to connect wallet: {e}")));
                return Err(e);
            }
        };

        let cancel = {
            let mut st = self.shared.state.write().await;
            st.epoch += 1;
            st.identity = Some(identity);
            st.connectivity = Connectivity::Connected;
            let cancel = self.shared.root.child_token();
            st.refresh_token = Some(cancel.clone());
            cancel
        };

        info!(
            wallet = %self.shared.wallet.name(),
            identity = %format_address(&identity.to_string()),
            cluster = %self.shared.cluster,
            "session connected"
        );

        // Failures are reported as notices; the session stays connected.
        let _ = tokio::join!(
            self.shared.refresh_balance(),
            self.shared.refresh_holdings()
        );

        let period = self.shared.refresh_interval;
        spawn_refresh_loop(
            Arc::clone(&self.shared),
            RefreshTarget::Balance,
            period,
            cancel.clone(),
        );
        spawn_refresh_loop(
            Arc::clone(&self.shared),
            RefreshTarget::Holdings,
            period,
            cancel,
        );

        Ok(identity)
    }

    /// Stop the refresh loops, disconnect the wallet and clear the session.
    ///
    /// A no-op unless connected.
    pub async fn disconnect(&self) -> Result<()> {
        let cancel = {
            let mut st = self.shared.state.write().await;
            if st.connectivity != Connectivity::Connected {
                return Ok(());
            }
            st.connectivity = Connectivity::Disconnecting;
            st.refresh_token.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        let result = self.shared.wallet.disconnect().await;

        {
            let mut st = self.shared.state.write().await;
            st.clear();
            st.epoch += 1;
            st.connectivity = Connectivity::Disconnected;
        }

        match &result {
            Ok(()) => info!("session disconnected"),
            Err(e) => self
                .shared
                .notify(Notice::error(format!("Failed to disconnect wallet: {e}"))),
        }
        result
    }

    /// Re-fetch the native balance now.
    pub async fn refresh_balance(&self) -> Result<()> {
        self.shared.refresh_balance().await
    }

    /// Re-fetch the token holdings now.
    pub async fn refresh_holdings(&self) -> Result<()> {
        self.shared.refresh_holdings().await
    }

    /// Prepend `record` to the history.
    pub async fn add_action(&self, record: ActionRecord) {
        let mut st = self.shared.state.write().await;
        debug!(kind = ?record.kind(), "action recorded");
        st.history.insert(0, record);
    }

    /// Publish a notice to subscribers.
    pub fn notify(&self, notice: Notice) {
        self.shared.notify(notice);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.shared.notices.subscribe()
    }

    /// Remember the display label of `mint` and apply it to current holdings.
    pub async fn label_token(&self, mint: &Pubkey, label: TokenLabel) {
        let mut st = self.shared.state.write().await;
        st.labels.insert(mint, label);
        let SessionState {
            labels, holdings, ..
        } = &mut *st;
        labels.apply(holdings);
    }

    /// Replace the label book, e.g. with one loaded from disk.
    pub async fn set_labels(&self, labels: LabelBook) {
        let mut st = self.shared.state.write().await;
        st.labels = labels;
        let SessionState {
            labels, holdings, ..
        } = &mut *st;
        labels.apply(holdings);
    }

    pub async fn labels(&self) -> LabelBook {
        self.shared.state.read().await.labels.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let st = self.shared.state.read().await;
        SessionSnapshot {
            identity: st.identity,
            connectivity: st.connectivity,
            balance: st.balance,
            holdings: st.holdings.clone(),
            loading: st.in_flight > 0,
            history: st.history.clone(),
        }
    }

    pub async fn identity(&self) -> Option<Pubkey> {
        self.shared.state.read().await.identity
    }

    pub async fn connectivity(&self) -> Connectivity {
        self.shared.state.read().await.connectivity
    }

    pub async fn is_connected(&self) -> bool {
        self.connectivity().await == Connectivity::Connected
    }

    pub async fn balance(&self) -> Decimal {
        self.shared.state.read().await.balance
    }

    pub async fn holdings(&self) -> Vec<TokenHolding> {
        self.shared.state.read().await.holdings.clone()
    }

    /// The known holding of `mint`, if any.
    pub async fn holding(&self, mint: &Pubkey) -> Option<TokenHolding> {
        self.shared
            .state
            .read()
            .await
            .holdings
            .iter()
            .find(|h| h.mint == *mint)
            .cloned()
    }

    pub async fn history(&self) -> Vec<ActionRecord> {
        self.shared.state.read().await.history.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.shared.state.read().await.in_flight > 0
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.shared.root.cancel();
    }
}
