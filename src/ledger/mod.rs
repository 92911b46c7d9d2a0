//! Ledger RPC access
//!
//! [`LedgerRpc`] is the seam the scanner, importer and orchestrator depend
//! on; [`HttpLedgerClient`] is the JSON-RPC implementation.

pub mod client;
pub mod types;

pub use client::{HttpLedgerClient, LEDGER_API};
pub use types::{
    InnerInstructions, Instruction, ParsedBody, ParsedInstruction, ParsedMessage,
    ParsedTransaction, RawInstruction, SignatureInfo, TransactionEnvelope, TransactionMeta,
};

use crate::errors::SyncResult;
use async_trait::async_trait;

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Newest-first signatures touching `address`, strictly older than `before`
    async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
        before: Option<&str>,
    ) -> SyncResult<Vec<SignatureInfo>>;

    /// `None` when the node does not know the transaction
    async fn get_parsed_transaction(&self, signature: &str) -> SyncResult<Option<ParsedTransaction>>;

    /// Raw account bytes, `None` when the account does not exist
    async fn get_account_info(&self, address: &str) -> SyncResult<Option<Vec<u8>>>;

    /// UI-unit balance of a token account; `None` when the node has none to report
    async fn get_token_account_balance(&self, _address: &str) -> SyncResult<Option<f64>> {
        Ok(None)
    }
}
