//! JSON-RPC client for the signing gateway

use std::time::Duration;

use axum::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{LedgerError, LedgerProvider};
use crate::escrow::{timestamp_to_datetime, Escrow, EscrowStatus};

/// Contract rejection codes, as forwarded by the gateway in the JSON-RPC
/// error `data` member. Must match the contract's error enum.
const ERR_UNAUTHORIZED: i64 = 1;
const ERR_ALREADY_INITIALIZED: i64 = 2;
const ERR_NOT_INITIALIZED: i64 = 3;
const ERR_ESCROW_NOT_FOUND: i64 = 4;
const ERR_INVALID_STATUS: i64 = 5;
const ERR_SELLER_IS_BUYER: i64 = 6;
const ERR_WRONG_DEPOSIT_AMOUNT: i64 = 7;
const ERR_FEE_OUT_OF_RANGE: i64 = 8;
const ERR_INVALID_AMOUNT: i64 = 9;

/// Ledger provider backed by a JSON-RPC 2.0 signing gateway.
///
/// The gateway wraps the wallet: it signs and submits transactions against
/// the escrow contract and answers read calls, so this process never touches
/// key material.
pub struct RpcLedgerProvider {
    gateway_url: String,
    contract_id: String,
    /// Passphrase of the network the gateway signs for; sent with every
    /// call so a misconfigured gateway fails loudly instead of signing
    /// against the wrong network.
    network_passphrase: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

/// Escrow record as the gateway serializes it (epoch-second timestamps).
#[derive(Debug, Deserialize)]
struct EscrowRecord {
    id: u64,
    seller: String,
    buyer: String,
    deposit_amount: i128,
    status: EscrowStatus,
    agent_fee_percentage: u32,
    description: String,
    created_at: u64,
    updated_at: u64,
}

impl From<EscrowRecord> for Escrow {
    fn from(record: EscrowRecord) -> Self {
        Escrow {
            id: record.id,
            seller: record.seller,
            buyer: record.buyer,
            deposit_amount: record.deposit_amount,
            status: record.status,
            agent_fee_percentage: record.agent_fee_percentage,
            description: record.description,
            created_at: timestamp_to_datetime(record.created_at),
            updated_at: timestamp_to_datetime(record.updated_at),
        }
    }
}

impl RpcLedgerProvider {
    pub fn new(gateway_url: String, contract_id: String, network_passphrase: String) -> Self {
        Self {
            gateway_url,
            contract_id,
            network_passphrase,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, LedgerError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": {
                "contract_id": self.contract_id,
                "network_passphrase": self.network_passphrase,
                "args": params,
            }
        });

        let response: JsonRpcResponse<R> = self
            .client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(classify_rpc_error(&err));
        }

        response
            .result
            .ok_or_else(|| LedgerError::Transport("empty JSON-RPC result".to_string()))
    }
}

/// Map a gateway error onto the ledger taxonomy. Contract rejections carry
/// the contract error code in `data`; anything else is a transport problem.
fn classify_rpc_error(err: &JsonRpcError) -> LedgerError {
    let contract_code = err.data.as_ref().and_then(|d| d.as_i64());

    match contract_code {
        Some(ERR_UNAUTHORIZED) => LedgerError::Authorization(err.message.clone()),
        Some(ERR_INVALID_STATUS) | Some(ERR_ALREADY_INITIALIZED) | Some(ERR_NOT_INITIALIZED) => {
            LedgerError::State(err.message.clone())
        }
        Some(ERR_SELLER_IS_BUYER)
        | Some(ERR_WRONG_DEPOSIT_AMOUNT)
        | Some(ERR_FEE_OUT_OF_RANGE)
        | Some(ERR_INVALID_AMOUNT) => LedgerError::Validation(err.message.clone()),
        Some(ERR_ESCROW_NOT_FOUND) => LedgerError::NotFound(err.message.clone()),
        _ => LedgerError::Transport(format!("RPC error {}: {}", err.code, err.message)),
    }
}

#[async_trait]
impl LedgerProvider for RpcLedgerProvider {
    async fn get_all_escrows(&self) -> Result<Vec<Escrow>, LedgerError> {
        let records: Vec<EscrowRecord> = self.call("get_all_escrows", json!({})).await?;
        Ok(records.into_iter().map(Escrow::from).collect())
    }

    async fn get_escrow_by_id(&self, escrow_id: u64) -> Result<Escrow, LedgerError> {
        let record: EscrowRecord = self
            .call("get_escrow_by_id", json!({ "escrow_id": escrow_id }))
            .await?;
        Ok(record.into())
    }

    async fn agent(&self) -> Result<String, LedgerError> {
        self.call("agent", json!({})).await
    }

    async fn agent_fee_percentage(&self) -> Result<u32, LedgerError> {
        self.call("agent_fee_percentage", json!({})).await
    }

    async fn withdrawable_funds(&self) -> Result<i128, LedgerError> {
        self.call("withdrawable_funds", json!({})).await
    }

    async fn signer_address(&self) -> Result<String, LedgerError> {
        self.call("signer_address", json!({})).await
    }

    async fn initiate_escrow(
        &self,
        seller: &str,
        buyer: &str,
        deposit_amount: i128,
        description: &str,
    ) -> Result<u64, LedgerError> {
        self.call(
            "initiate_escrow",
            json!({
                "seller": seller,
                "buyer": buyer,
                "deposit_amount": deposit_amount,
                "description": description,
            }),
        )
        .await
    }

    async fn deposit_escrow(&self, escrow_id: u64, amount: i128) -> Result<(), LedgerError> {
        self.call(
            "deposit_escrow",
            json!({ "escrow_id": escrow_id, "amount": amount }),
        )
        .await
    }

    async fn approve_escrow(&self, escrow_id: u64) -> Result<(), LedgerError> {
        self.call("approve_escrow", json!({ "escrow_id": escrow_id }))
            .await
    }

    async fn reject_escrow(&self, escrow_id: u64) -> Result<(), LedgerError> {
        self.call("reject_escrow", json!({ "escrow_id": escrow_id }))
            .await
    }

    async fn archive_escrow(&self, escrow_id: u64) -> Result<(), LedgerError> {
        self.call("archive_escrow", json!({ "escrow_id": escrow_id }))
            .await
    }

    async fn change_agent(&self, new_agent: &str) -> Result<(), LedgerError> {
        self.call("change_agent", json!({ "new_agent": new_agent }))
            .await
    }

    async fn change_agent_fee_percentage(&self, new_fee: u32) -> Result<(), LedgerError> {
        self.call("change_agent_fee_percentage", json!({ "new_fee": new_fee }))
            .await
    }

    async fn withdraw_funds(&self) -> Result<(), LedgerError> {
        self.call("withdraw_funds", json!({})).await
    }
}
