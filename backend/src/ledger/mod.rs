//! Ledger access for the sync layer
//!
//! The contract is the sole source of truth; everything the server knows
//! about it flows through the [`LedgerProvider`] trait. The production
//! implementation talks JSON-RPC to a signing gateway (the wallet-side
//! external dependency holding the submitting account's keys); tests inject
//! an in-memory implementation.

mod rpc;

pub use rpc::RpcLedgerProvider;

use axum::async_trait;
use thiserror::Error;

use crate::escrow::Escrow;

/// Errors surfaced by ledger reads and writes.
///
/// The first four variants mirror the contract's own rejection taxonomy;
/// `Transport` covers everything between this process and the chain.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Invalid escrow state: {0}")]
    State(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ledger transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Transport(err.to_string())
    }
}

/// Read/write surface of the escrow agent contract.
///
/// Write methods are submitted through the gateway's signer, so the caller
/// identity of every on-chain operation is the gateway's configured account.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    async fn get_all_escrows(&self) -> Result<Vec<Escrow>, LedgerError>;
    async fn get_escrow_by_id(&self, escrow_id: u64) -> Result<Escrow, LedgerError>;
    async fn agent(&self) -> Result<String, LedgerError>;
    async fn agent_fee_percentage(&self) -> Result<u32, LedgerError>;
    async fn withdrawable_funds(&self) -> Result<i128, LedgerError>;

    /// Address the gateway signs with; the sync layer's own identity.
    async fn signer_address(&self) -> Result<String, LedgerError>;

    async fn initiate_escrow(
        &self,
        seller: &str,
        buyer: &str,
        deposit_amount: i128,
        description: &str,
    ) -> Result<u64, LedgerError>;
    async fn deposit_escrow(&self, escrow_id: u64, amount: i128) -> Result<(), LedgerError>;
    async fn approve_escrow(&self, escrow_id: u64) -> Result<(), LedgerError>;
    async fn reject_escrow(&self, escrow_id: u64) -> Result<(), LedgerError>;
    async fn archive_escrow(&self, escrow_id: u64) -> Result<(), LedgerError>;
    async fn change_agent(&self, new_agent: &str) -> Result<(), LedgerError>;
    async fn change_agent_fee_percentage(&self, new_fee: u32) -> Result<(), LedgerError>;
    async fn withdraw_funds(&self) -> Result<(), LedgerError>;
}
