use std::io::Write;

use mintkit::types::ActionKind;
use mintkit::utils::format_address;
use mintkit::{ActionRecord, Notice, NoticeLevel, OperationOutcome, TokenHolding, TokenMetadata};
use rust_decimal::Decimal;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;

use crate::error::Result;

/// Writes command results as TSV lines or one JSON document per line.
pub struct Output<W: Write> {
    writer: W,
    json: bool,
}

impl<W: Write> Output<W> {
    pub fn new(writer: W, json: bool) -> Self {
        Self { writer, json }
    }

    fn emit(&mut self, value: serde_json::Value, tsv: &str) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.writer, &value)?;
            self.writer.write_all(b"\n")?;
        } else {
            self.writer.write_all(tsv.as_bytes())?;
            if !tsv.ends_with('\n') {
                self.writer.write_all(b"\n")?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// address \t balance
    pub fn balance(&mut self, address: &Pubkey, sol: Decimal) -> Result<()> {
        self.emit(
            json!({ "address": address.to_string(), "sol": sol }),
            &format!("{address}\t{sol}"),
        )
    }

    /// One line per holding: name \t mint \t balance \t decimals \t account
    pub fn holdings(&mut self, holdings: &[TokenHolding]) -> Result<()> {
        if self.json {
            return self.emit(serde_json::to_value(holdings)?, "");
        }
        if holdings.is_empty() {
            return self.emit(json!(null), "no tokens");
        }
        let mut tsv = String::new();
        for h in holdings {
            tsv.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                h.display_name(),
                h.mint,
                h.balance,
                h.decimals,
                h.account
            ));
        }
        self.emit(json!(null), &tsv)
    }

    pub fn metadata(&mut self, metadata: &TokenMetadata) -> Result<()> {
        let tsv = format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            metadata.mint,
            metadata.supply,
            metadata.decimals,
            metadata.is_initialized,
            metadata.mint_authority.as_deref().unwrap_or("-"),
            metadata.freeze_authority.as_deref().unwrap_or("-"),
        );
        self.emit(serde_json::to_value(metadata)?, &tsv)
    }

    pub fn outcome(&mut self, outcome: &OperationOutcome) -> Result<()> {
        let (value, tsv) = match outcome {
            OperationOutcome::Created(c) => (
                serde_json::to_value(c)?,
                format!("{}\t{}\t{}\t{}", c.label.symbol, c.mint, c.decimals, c.explorer_url),
            ),
            OperationOutcome::Minted(m) => (
                serde_json::to_value(m)?,
                format!("{}\t{}\t{}", m.mint, m.amount, m.explorer_url),
            ),
            OperationOutcome::Sent(s) => (
                serde_json::to_value(s)?,
                format!(
                    "{}\t{}\t{}\t{}",
                    s.mint, s.recipient, s.amount, s.explorer_url
                ),
            ),
        };
        self.emit(value, &tsv)
    }

    pub fn airdrop(&mut self, sol: Decimal, explorer_url: &str) -> Result<()> {
        self.emit(
            json!({ "sol": sol, "explorer_url": explorer_url }),
            &format!("{sol}\t{explorer_url}"),
        )
    }

    /// Newest first: timestamp \t kind \t summary \t explorer url
    pub fn history(&mut self, records: &[ActionRecord]) -> Result<()> {
        if self.json {
            return self.emit(serde_json::to_value(records)?, "");
        }
        if records.is_empty() {
            return self.emit(json!(null), "no actions yet");
        }
        let mut tsv = String::new();
        for r in records {
            tsv.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                kind_name(r.kind()),
                r.summary(),
                r.explorer_url()
            ));
        }
        self.emit(json!(null), &tsv)
    }

    pub fn notice(&mut self, notice: &Notice) -> Result<()> {
        let level = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        self.emit(
            serde_json::to_value(notice)?,
            &format!("[{level}] {}", notice.message),
        )
    }

    pub fn text(&mut self, line: &str) -> Result<()> {
        self.emit(json!({ "message": line }), line)
    }

    /// connected <short address> via <wallet>
    pub fn identity(&mut self, address: &Pubkey, wallet: &str) -> Result<()> {
        self.emit(
            json!({ "address": address.to_string(), "wallet": wallet }),
            &format!(
                "connected {} via {wallet}",
                format_address(&address.to_string())
            ),
        )
    }
}

fn kind_name(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Creation => "create",
        ActionKind::Mint => "mint",
        ActionKind::Transfer => "send",
    }
}
