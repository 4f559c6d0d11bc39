use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stellar_xdr::next::{Limits, ReadXdr, ScVal};
use tokio::time::sleep;

use crate::escrow::model::EscrowEvent;
use crate::escrow::service::EscrowSyncService;
use crate::websocket::WsState;

/// Soroban RPC getEvents response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetEventsResponse {
    events: Vec<SorobanEvent>,
    latest_ledger: u64,
}

/// Raw event as the RPC returns it, topics and value still XDR-encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SorobanEvent {
    ledger: u64,
    topic: Vec<String>,
    value: SorobanEventValue,
    paging_token: String,
}

#[derive(Debug, Deserialize)]
struct SorobanEventValue {
    xdr: String,
}

/// Polls Soroban RPC for contract events and folds them into the sync
/// service, fanning each decoded event out to WebSocket subscribers.
pub struct EventListener {
    rpc_url: String,
    contract_id: String,
    poll_interval: Duration,
    client: Client,
    sync_service: Arc<EscrowSyncService>,
    ws_state: WsState,
}

impl EventListener {
    pub fn new(
        rpc_url: String,
        contract_id: String,
        poll_interval: Duration,
        sync_service: Arc<EscrowSyncService>,
        ws_state: WsState,
    ) -> Self {
        Self {
            rpc_url,
            contract_id,
            poll_interval,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            sync_service,
            ws_state,
        }
    }

    pub async fn start(self) {
        tracing::info!(contract_id = %self.contract_id, "event listener started");

        // Cursor is in-memory only. The initial snapshot already holds the
        // current state, so polling begins at the chain tip; replaying
        // history would re-apply events the snapshot has counted.
        let mut last_seen_ledger: u64 = loop {
            match self.fetch_latest_ledger().await {
                Ok(sequence) => break sequence,
                Err(e) => {
                    tracing::error!("failed to resolve chain tip: {}", e);
                    sleep(Duration::from_secs(5)).await;
                }
            }
        };
        let mut cursor = String::new();

        loop {
            match self.process_batch(&cursor, last_seen_ledger).await {
                Ok((next_cursor, next_ledger)) => {
                    cursor = next_cursor;
                    last_seen_ledger = next_ledger;
                }
                Err(e) => {
                    tracing::error!("event polling failed: {}", e);
                    sleep(Duration::from_secs(5)).await;
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn process_batch(
        &self,
        cursor: &str,
        last_seen_ledger: u64,
    ) -> Result<(String, u64)> {
        let response = self.fetch_events(cursor, last_seen_ledger).await?;

        // Reorg or network reset: the RPC's tip fell behind us. Drop the
        // cursor, re-snapshot, and resume from the new tip rather than
        // trusting stale events.
        if last_seen_ledger > 0 && response.latest_ledger < last_seen_ledger {
            tracing::warn!(
                latest = response.latest_ledger,
                seen = last_seen_ledger,
                "ledger regression detected, resetting cursor"
            );
            if let Err(e) = self.sync_service.refresh_snapshot().await {
                tracing::error!("snapshot refresh after reset failed: {}", e);
            }
            return Ok((String::new(), response.latest_ledger));
        }

        if response.events.is_empty() {
            let ledger = last_seen_ledger.max(response.latest_ledger);
            return Ok((cursor.to_string(), ledger));
        }

        tracing::debug!(count = response.events.len(), "fetched contract events");

        let mut next_cursor = cursor.to_string();
        let mut max_ledger = last_seen_ledger;

        for raw in &response.events {
            match parse_contract_event(raw) {
                Ok(Some(event)) => {
                    self.sync_service.apply_event(&event).await;
                    self.ws_state.broadcast_event(event).await;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping undecodable event: {}", e),
            }
            next_cursor = raw.paging_token.clone();
            max_ledger = raw.ledger;
        }

        Ok((next_cursor, max_ledger))
    }

    async fn fetch_latest_ledger(&self) -> Result<u64> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getLatestLedger",
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        if let Some(err) = resp.get("error") {
            return Err(anyhow!("RPC error: {:?}", err));
        }

        resp.get("result")
            .and_then(|r| r.get("sequence"))
            .and_then(|s| s.as_u64())
            .ok_or_else(|| anyhow!("no ledger sequence in RPC response"))
    }

    async fn fetch_events(&self, cursor: &str, start_ledger: u64) -> Result<GetEventsResponse> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getEvents",
            "params": {
                "startLedger": if cursor.is_empty() { json!(start_ledger) } else { serde_json::Value::Null },
                "filters": [
                    {
                        "type": "contract",
                        "contractIds": [self.contract_id]
                    }
                ],
                "pagination": {
                    "cursor": if cursor.is_empty() { serde_json::Value::Null } else { json!(cursor) },
                    "limit": 100
                }
            }
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        if let Some(err) = resp.get("error") {
            return Err(anyhow!("RPC error: {:?}", err));
        }

        let result = resp
            .get("result")
            .ok_or_else(|| anyhow!("no result in RPC response"))?;
        Ok(serde_json::from_value(result.clone())?)
    }
}

/// Periodically re-snapshot the contract so the read model heals from any
/// missed or misordered events.
pub async fn snapshot_refresher(sync_service: Arc<EscrowSyncService>, interval: Duration) {
    loop {
        sleep(interval).await;
        if let Err(e) = sync_service.refresh_snapshot().await {
            tracing::warn!("periodic snapshot refresh failed: {}", e);
        }
    }
}

/// Decode one raw RPC event into a domain event. Returns Ok(None) for
/// topics this contract does not emit.
fn parse_contract_event(event: &SorobanEvent) -> Result<Option<EscrowEvent>> {
    let topics = decode_topics(&event.topic)?;
    let name = match topics.first() {
        Some(ScVal::Symbol(s)) => s.to_string(),
        _ => return Ok(None),
    };

    let value_xdr = general_purpose::STANDARD.decode(&event.value.xdr)?;
    let data = ScVal::from_xdr(&value_xdr, Limits::len(32_768))?;
    let args = match &data {
        ScVal::Vec(Some(args)) => args,
        _ => return Err(anyhow!("event data is not a vector")),
    };

    let parsed = match name.as_str() {
        "esc_init" => {
            if args.len() < 5 {
                return Err(anyhow!("esc_init expects 5 args"));
            }
            Some(EscrowEvent::Initiated {
                escrow_id: scval_to_u64(&args[0])?,
                seller: scval_to_address(&args[1])?,
                buyer: scval_to_address(&args[2])?,
                deposit_amount: scval_to_i128(&args[3])?,
                timestamp: scval_to_u64(&args[4])?,
            })
        }
        "esc_dep" | "esc_appr" | "esc_rej" | "esc_arch" => {
            if args.len() < 2 {
                return Err(anyhow!("{} expects 2 args", name));
            }
            let escrow_id = scval_to_u64(&args[0])?;
            let timestamp = scval_to_u64(&args[1])?;
            Some(match name.as_str() {
                "esc_dep" => EscrowEvent::Deposited {
                    escrow_id,
                    timestamp,
                },
                "esc_appr" => EscrowEvent::Approved {
                    escrow_id,
                    timestamp,
                },
                "esc_rej" => EscrowEvent::Rejected {
                    escrow_id,
                    timestamp,
                },
                _ => EscrowEvent::Archived {
                    escrow_id,
                    timestamp,
                },
            })
        }
        "wthdrw" => {
            if args.len() < 2 {
                return Err(anyhow!("wthdrw expects 2 args"));
            }
            Some(EscrowEvent::FundsWithdrawn {
                amount: scval_to_i128(&args[0])?,
                timestamp: scval_to_u64(&args[1])?,
            })
        }
        "agnt_chg" => {
            if args.len() < 2 {
                return Err(anyhow!("agnt_chg expects 2 args"));
            }
            Some(EscrowEvent::AgentChanged {
                agent: scval_to_address(&args[0])?,
                timestamp: scval_to_u64(&args[1])?,
            })
        }
        "fee_chg" => {
            if args.len() < 2 {
                return Err(anyhow!("fee_chg expects 2 args"));
            }
            Some(EscrowEvent::FeeChanged {
                fee: scval_to_u32(&args[0])?,
                timestamp: scval_to_u64(&args[1])?,
            })
        }
        _ => None,
    };

    Ok(parsed)
}

fn decode_topics(topics: &[String]) -> Result<Vec<ScVal>> {
    let mut res = Vec::new();
    for t in topics {
        let bytes = general_purpose::STANDARD.decode(t)?;
        res.push(ScVal::from_xdr(&bytes, Limits::len(32_768))?);
    }
    Ok(res)
}

fn scval_to_u64(val: &ScVal) -> Result<u64> {
    match val {
        ScVal::U64(v) => Ok(*v),
        ScVal::I64(v) => Ok(*v as u64),
        ScVal::U32(v) => Ok(*v as u64),
        ScVal::I32(v) => Ok(*v as u64),
        _ => Err(anyhow!("expected U64-like value")),
    }
}

fn scval_to_u32(val: &ScVal) -> Result<u32> {
    match val {
        ScVal::U32(v) => Ok(*v),
        ScVal::U64(v) => Ok(u32::try_from(*v)?),
        _ => Err(anyhow!("expected U32-like value")),
    }
}

fn scval_to_i128(val: &ScVal) -> Result<i128> {
    match val {
        ScVal::I128(v) => Ok(i128::from(v.lo) | ((i128::from(v.hi)) << 64)),
        ScVal::U64(v) => Ok(*v as i128),
        ScVal::I64(v) => Ok(*v as i128),
        _ => Err(anyhow!("expected I128-like value")),
    }
}

fn scval_to_address(val: &ScVal) -> Result<String> {
    match val {
        ScVal::Address(addr) => Ok(addr.to_string()),
        _ => Err(anyhow!("expected Address")),
    }
}
