//! Turn parsed transactions into burn and transfer events

use crate::ledger::{Instruction, ParsedInstruction, ParsedTransaction};
use serde::{Deserialize, Serialize};

/// How burns reach the scanned address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnSource {
    /// The token mint itself; burns may be top-level or inner instructions
    TokenMint,
    /// A program that burns via CPI; only inner instructions count
    BurnProgram,
}

impl BurnSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BurnSource::TokenMint => "token_mint",
            BurnSource::BurnProgram => "burn_program",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "token_mint" => Some(BurnSource::TokenMint),
            "burn_program" => Some(BurnSource::BurnProgram),
            _ => None,
        }
    }
}

/// What and where to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub project_id: i64,
    /// Address whose history is walked
    pub address: String,
    pub source: BurnSource,
    /// Burns of other mints are ignored
    pub mint: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnEvent {
    pub signature: String,
    pub project_id: i64,
    pub timestamp: i64,
    /// Human-readable units
    pub amount: f64,
    pub raw_amount: u64,
    /// Burn authority
    pub source_address: String,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub signature: String,
    pub project_id: i64,
    pub timestamp: i64,
    pub amount: f64,
    pub raw_amount: u64,
    pub source: String,
    pub destination: String,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedEvent {
    Burn(BurnEvent),
    Transfer(TransferEvent),
}

impl ClassifiedEvent {
    pub fn signature(&self) -> &str {
        match self {
            ClassifiedEvent::Burn(e) => &e.signature,
            ClassifiedEvent::Transfer(e) => &e.signature,
        }
    }
}

pub fn to_ui_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

fn mint_matches(ix: &ParsedInstruction, mint: &str) -> bool {
    match ix.info_str("mint") {
        Some(m) => m == mint,
        None => true,
    }
}

fn candidate_instructions<'a>(
    tx: &'a ParsedTransaction,
    source: BurnSource,
) -> Box<dyn Iterator<Item = &'a ParsedInstruction> + 'a> {
    let inner = tx.inner_instructions().filter_map(Instruction::as_parsed);
    match source {
        BurnSource::TokenMint => Box::new(
            tx.top_level_instructions()
                .iter()
                .filter_map(Instruction::as_parsed)
                .chain(inner),
        ),
        BurnSource::BurnProgram => Box::new(inner),
    }
}

/// Classify one transaction
///
/// Failed transactions yield nothing. At most one burn (the first matching
/// instruction) and one transfer are produced per transaction.
pub fn classify_transaction(
    tx: &ParsedTransaction,
    signature: &str,
    request: &ScanRequest,
    fallback_timestamp: i64,
) -> Vec<ClassifiedEvent> {
    if tx.is_failed() {
        return Vec::new();
    }

    let timestamp = tx.block_time.unwrap_or(fallback_timestamp);
    let mut events = Vec::new();

    let burn = candidate_instructions(tx, request.source).find(|ix| {
        matches!(ix.kind(), Some("burn") | Some("burnChecked")) && mint_matches(ix, &request.mint)
    });
    if let Some(ix) = burn {
        if let Some(raw) = ix.raw_amount() {
            events.push(ClassifiedEvent::Burn(BurnEvent {
                signature: signature.to_string(),
                project_id: request.project_id,
                timestamp,
                amount: to_ui_amount(raw, request.decimals),
                raw_amount: raw,
                source_address: ix
                    .info_str("authority")
                    .or_else(|| ix.info_str("multisigAuthority"))
                    .unwrap_or_default()
                    .to_string(),
                slot: tx.slot,
            }));
        }
    }

    let transfer = candidate_instructions(tx, request.source).find(|ix| {
        matches!(ix.kind(), Some("transfer") | Some("transferChecked"))
            && mint_matches(ix, &request.mint)
            && ix.raw_amount().is_some()
    });
    if let Some(ix) = transfer {
        let raw = ix.raw_amount().unwrap_or_default();
        events.push(ClassifiedEvent::Transfer(TransferEvent {
            signature: signature.to_string(),
            project_id: request.project_id,
            timestamp,
            amount: to_ui_amount(raw, request.decimals),
            raw_amount: raw,
            source: ix.info_str("source").unwrap_or_default().to_string(),
            destination: ix.info_str("destination").unwrap_or_default().to_string(),
            slot: tx.slot,
        }));
    }

    events
}
