//! Wallet session lifecycle and background refresh behaviour.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{connected_session, session_on, MemoryChain};
use mintkit::{
    ActionDetail, ActionRecord, Connectivity, MintForm, MintkitError, NoticeLevel, TokenDesk,
    TokenLabel,
};
use rust_decimal_macros::dec;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

fn minted(mint: Pubkey, n: u32) -> ActionRecord {
    ActionRecord {
        timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, n).unwrap(),
        detail: ActionDetail::TokensMinted {
            mint,
            amount: n.into(),
            signature: format!("sig{n}"),
            explorer_url: format!("https://explorer.solana.com/tx/sig{n}?cluster=devnet"),
        },
    }
}

// ---- connect / disconnect ----

#[tokio::test]
async fn test_connect_fetches_balance_and_holdings() {
    let chain = Arc::new(MemoryChain::new());
    let keypair = Keypair::new();
    let owner = keypair.pubkey();
    chain.fund(&owner, 1_500_000_000);
    let mint = Pubkey::new_unique();
    chain.credit(&owner, &mint, 6, 2_500_000);

    let session = session_on(&chain, keypair);
    assert_eq!(session.connectivity().await, Connectivity::Disconnected);

    let identity = session.connect().await.unwrap();
    assert_eq!(identity, owner);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.connectivity, Connectivity::Connected);
    assert_eq!(snapshot.identity, Some(owner));
    assert_eq!(snapshot.balance, dec!(1.5));
    assert_eq!(snapshot.holdings.len(), 1);
    assert_eq!(snapshot.holdings[0].balance, dec!(2.5));
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, MintkitError::AlreadyConnected));
}

#[tokio::test]
async fn test_disconnect_clears_session() {
    let chain = Arc::new(MemoryChain::new());
    let (session, owner) = connected_session(&chain).await;
    chain.credit(&owner, &Pubkey::new_unique(), 0, 7);
    session.refresh_holdings().await.unwrap();
    session.add_action(minted(Pubkey::new_unique(), 1)).await;

    session.disconnect().await.unwrap();

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.connectivity, Connectivity::Disconnected);
    assert_eq!(snapshot.identity, None);
    assert_eq!(snapshot.balance, dec!(0));
    assert!(snapshot.holdings.is_empty());
    assert!(snapshot.history.is_empty());
    assert!(session.wallet().pubkey().is_none());

    // a second disconnect is a no-op; reconnecting works
    session.disconnect().await.unwrap();
    assert_eq!(session.connect().await.unwrap(), owner);
    assert_eq!(session.holdings().await.len(), 1);
}

#[tokio::test]
async fn test_refresh_requires_connection() {
    let chain = Arc::new(MemoryChain::new());
    let session = session_on(&chain, Keypair::new());
    assert!(matches!(
        session.refresh_balance().await,
        Err(MintkitError::WalletNotConnected)
    ));
    assert_eq!(chain.call_count(), 0);
}

// ---- history ----

#[tokio::test]
async fn test_add_action_prepends_without_dedup() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    let mint = Pubkey::new_unique();

    session.add_action(minted(mint, 1)).await;
    session.add_action(minted(mint, 2)).await;
    session.add_action(minted(mint, 2)).await;

    let history = session.history().await;
    let signatures: Vec<_> = history
        .iter()
        .map(|r| match &r.detail {
            ActionDetail::TokensMinted { signature, .. } => signature.as_str(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(signatures, vec!["sig2", "sig2", "sig1"]);
}

// ---- refresh failures ----

#[tokio::test]
async fn test_failed_refresh_keeps_previous_values() {
    let chain = Arc::new(MemoryChain::new());
    let (session, owner) = connected_session(&chain).await;
    chain.credit(&owner, &Pubkey::new_unique(), 2, 100);
    session.refresh_holdings().await.unwrap();
    let mut notices = session.subscribe_notices();

    chain.set_fail_reads(true);
    assert!(session.refresh_holdings().await.is_err());
    assert!(session.refresh_balance().await.is_err());

    assert_eq!(session.holdings().await.len(), 1);
    assert_eq!(session.balance().await, dec!(2));
    assert!(!session.is_loading().await);

    let first = notices.try_recv().unwrap();
    assert_eq!(first.level, NoticeLevel::Error);
    assert_eq!(first.message, "Failed to fetch token accounts");
    assert_eq!(
        notices.try_recv().unwrap().message,
        "Failed to fetch wallet balance"
    );
    assert!(session.is_connected().await);
}

// ---- labels ----

#[tokio::test]
async fn test_labels_apply_to_holdings() {
    let chain = Arc::new(MemoryChain::new());
    let (session, owner) = connected_session(&chain).await;
    let mint = Pubkey::new_unique();
    chain.credit(&owner, &mint, 0, 1);
    session.refresh_holdings().await.unwrap();
    assert_eq!(session.holding(&mint).await.unwrap().label, None);

    let label = TokenLabel {
        name: "Silver".into(),
        symbol: "SLV".into(),
    };
    session.label_token(&mint, label.clone()).await;
    assert_eq!(session.holding(&mint).await.unwrap().label, Some(label.clone()));

    // survives a refresh
    session.refresh_holdings().await.unwrap();
    assert_eq!(session.holding(&mint).await.unwrap().label, Some(label));
}

// ---- background loops ----

#[tokio::test(start_paused = true)]
async fn test_holdings_loop_refreshes_on_each_tick() {
    let chain = Arc::new(MemoryChain::new());
    let (session, owner) = connected_session(&chain).await;
    assert!(session.holdings().await.is_empty());

    chain.credit(&owner, &Pubkey::new_unique(), 2, 500);
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(session.holdings().await.is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.holdings().await.len(), 1);

    chain.fund(&owner, 1_000_000_000);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(session.balance().await, dec!(3));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_refresh_loops() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(chain.calls_to("get_balance"), 3);

    session.disconnect().await.unwrap();
    let balance_calls = chain.calls_to("get_balance");
    let holdings_calls = chain.calls_to("get_token_accounts_by_owner");

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(chain.calls_to("get_balance"), balance_calls);
    assert_eq!(
        chain.calls_to("get_token_accounts_by_owner"),
        holdings_calls
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_stops_refresh_loops() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    drop(session);

    let calls = chain.call_count();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(chain.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_ticks_during_mint_do_not_disturb_result() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    let mut notices = session.subscribe_notices();
    let desk = TokenDesk::new(session.clone());

    let created = desk
        .create(mintkit::CreateTokenForm {
            name: "Gold".into(),
            symbol: "GLD".into(),
            decimals: Some(2),
        })
        .await
        .unwrap();

    // the mint spans two refresh ticks
    chain.set_send_latency(Duration::from_secs(65));
    let reads_before = chain.calls_to("get_token_accounts_by_owner");
    desk.mint(MintForm {
        mint: created.mint.to_string(),
        amount: "150".into(),
    })
    .await
    .unwrap();
    // two ticks plus the post-mint refresh
    assert!(chain.calls_to("get_token_accounts_by_owner") >= reads_before + 3);

    let holding = session.holding(&created.mint).await.unwrap();
    assert_eq!(holding.balance, dec!(150));

    tokio::time::sleep(Duration::from_secs(31)).await;
    let holding = session.holding(&created.mint).await.unwrap();
    assert_eq!(holding.balance, dec!(150));

    while let Ok(notice) = notices.try_recv() {
        assert_ne!(notice.level, NoticeLevel::Error, "{}", notice.message);
    }
}

#[tokio::test(start_paused = true)]
async fn test_refresh_in_flight_across_disconnect_is_discarded() {
    let chain = Arc::new(MemoryChain::new());
    let (session, owner) = connected_session(&chain).await;
    chain.credit(&owner, &Pubkey::new_unique(), 0, 5);
    chain.set_read_latency(Duration::from_secs(5));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.refresh_holdings().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    session.disconnect().await.unwrap();
    pending.await.unwrap().unwrap();

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.connectivity, Connectivity::Disconnected);
    assert!(snapshot.holdings.is_empty());
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failing_after_disconnect_is_silent() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    chain.set_read_latency(Duration::from_secs(5));
    chain.set_fail_reads(true);

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.refresh_holdings().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    session.disconnect().await.unwrap();
    let mut notices = session.subscribe_notices();
    assert!(pending.await.unwrap().is_err());

    assert!(notices.try_recv().is_err());
    assert!(!session.is_loading().await);
}

#[tokio::test(start_paused = true)]
async fn test_loading_raised_while_refresh_in_flight() {
    let chain = Arc::new(MemoryChain::new());
    let (session, _) = connected_session(&chain).await;
    chain.set_read_latency(Duration::from_secs(5));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.refresh_holdings().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(session.is_loading().await);

    pending.await.unwrap().unwrap();
    assert!(!session.is_loading().await);
}
