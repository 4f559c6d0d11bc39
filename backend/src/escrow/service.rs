use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::escrow::model::{
    timestamp_to_datetime, AgentStateResponse, ChangeAgentRequest, ChangeFeeRequest,
    DepositEscrowRequest, Escrow, EscrowEvent, EscrowStatus, InitiateEscrowRequest,
};
use crate::ledger::{LedgerError, LedgerProvider};

/// Cached contract state. The ledger is the sole authority; this is a
/// read model rebuilt from snapshots and kept fresh by events.
#[derive(Debug, Default)]
struct ReadModel {
    escrows: Vec<Escrow>,
    agent: String,
    agent_fee_percentage: u32,
    withdrawable_funds: i128,
}

/// Keeps a local mirror of the escrow contract and submits writes through
/// the signing gateway.
pub struct EscrowSyncService {
    provider: Arc<dyn LedgerProvider>,
    read_model: RwLock<ReadModel>,
    /// Set while a submitted transaction is awaiting confirmation.
    pending: AtomicBool,
    /// Address the gateway signs with, fetched once on connect.
    signer: RwLock<Option<String>>,
}

impl EscrowSyncService {
    pub fn new(provider: Arc<dyn LedgerProvider>) -> Self {
        Self {
            provider,
            read_model: RwLock::new(ReadModel::default()),
            pending: AtomicBool::new(false),
            signer: RwLock::new(None),
        }
    }

    /// Resolve the signing account and take an initial snapshot.
    pub async fn connect(&self) -> Result<(), LedgerError> {
        let address = self.provider.signer_address().await?;
        info!(signer = %address, "connected to signing gateway");
        *self.signer.write().await = Some(address);
        self.refresh_snapshot().await
    }

    /// Re-read the full contract state and replace the cached model.
    ///
    /// The four reads are sequential, not atomic. A ledger close between
    /// them can produce a briefly inconsistent snapshot; the next event or
    /// refresh converges it.
    pub async fn refresh_snapshot(&self) -> Result<(), LedgerError> {
        let mut escrows = self.provider.get_all_escrows().await?;
        let agent = self.provider.agent().await?;
        let fee = self.provider.agent_fee_percentage().await?;
        let funds = self.provider.withdrawable_funds().await?;

        escrows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut model = self.read_model.write().await;
        model.escrows = escrows;
        model.agent = agent;
        model.agent_fee_percentage = fee;
        model.withdrawable_funds = funds;
        debug!(count = model.escrows.len(), "snapshot refreshed");
        Ok(())
    }

    /// Fold one decoded contract event into the read model.
    pub async fn apply_event(&self, event: &EscrowEvent) {
        match event {
            EscrowEvent::Initiated { escrow_id, .. } => {
                // The event omits description and fee snapshot, so fetch
                // the full record instead of synthesizing one.
                match self.provider.get_escrow_by_id(*escrow_id).await {
                    Ok(escrow) => {
                        let mut model = self.read_model.write().await;
                        model.escrows.retain(|e| e.id != escrow.id);
                        model.escrows.push(escrow);
                        Self::resort(&mut model);
                    }
                    Err(e) => {
                        warn!(escrow_id, error = %e, "failed to fetch initiated escrow");
                    }
                }
            }
            EscrowEvent::Deposited {
                escrow_id,
                timestamp,
            } => {
                self.set_status(*escrow_id, EscrowStatus::Deposited, *timestamp)
                    .await;
            }
            EscrowEvent::Approved {
                escrow_id,
                timestamp,
            } => {
                {
                    let mut model = self.read_model.write().await;
                    let record = model
                        .escrows
                        .iter()
                        .find(|e| e.id == *escrow_id)
                        .map(|e| (e.status, e.deposit_amount, e.agent_fee_percentage));
                    match record {
                        // A replayed event for a record the snapshot already
                        // saw as Approved must not grow the pool again.
                        Some((EscrowStatus::Approved, _, _)) => {}
                        Some((_, amount, pct)) => {
                            model.withdrawable_funds += amount * (pct as i128) / 100;
                        }
                        None => {
                            warn!(escrow_id, "approved escrow missing from read model");
                        }
                    }
                }
                self.set_status(*escrow_id, EscrowStatus::Approved, *timestamp)
                    .await;
            }
            EscrowEvent::Rejected {
                escrow_id,
                timestamp,
            } => {
                self.set_status(*escrow_id, EscrowStatus::Rejected, *timestamp)
                    .await;
            }
            EscrowEvent::Archived {
                escrow_id,
                timestamp,
            } => {
                self.set_status(*escrow_id, EscrowStatus::Archived, *timestamp)
                    .await;
            }
            EscrowEvent::FundsWithdrawn { amount, .. } => {
                let mut model = self.read_model.write().await;
                model.withdrawable_funds = 0;
                debug!(amount, "fee pool drained");
            }
            EscrowEvent::AgentChanged { agent, .. } => {
                let mut model = self.read_model.write().await;
                model.agent = agent.clone();
            }
            EscrowEvent::FeeChanged { fee, .. } => {
                let mut model = self.read_model.write().await;
                model.agent_fee_percentage = *fee;
            }
        }
    }

    async fn set_status(&self, escrow_id: u64, status: EscrowStatus, timestamp: u64) {
        let mut model = self.read_model.write().await;
        match model.escrows.iter_mut().find(|e| e.id == escrow_id) {
            Some(escrow) => {
                escrow.status = status;
                escrow.updated_at = timestamp_to_datetime(timestamp);
                Self::resort(&mut model);
            }
            None => {
                warn!(escrow_id, status = status.as_str(), "event for unknown escrow");
            }
        }
    }

    fn resort(model: &mut ReadModel) {
        model.escrows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    // --- reads ---

    pub async fn escrows(&self) -> Vec<Escrow> {
        self.read_model.read().await.escrows.clone()
    }

    pub async fn escrow_by_id(&self, escrow_id: u64) -> Option<Escrow> {
        self.read_model
            .read()
            .await
            .escrows
            .iter()
            .find(|e| e.id == escrow_id)
            .cloned()
    }

    pub async fn agent_state(&self) -> AgentStateResponse {
        let model = self.read_model.read().await;
        AgentStateResponse {
            agent: model.agent.clone(),
            agent_fee_percentage: model.agent_fee_percentage,
            withdrawable_funds: model.withdrawable_funds,
            pending: self.is_pending(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    // --- writes ---

    pub async fn initiate_escrow(&self, req: &InitiateEscrowRequest) -> Result<u64, LedgerError> {
        req.validate().map_err(LedgerError::Validation)?;
        let result = self
            .submit(self.provider.initiate_escrow(
                &req.seller,
                &req.buyer,
                req.deposit_amount,
                &req.description,
            ))
            .await;
        match result {
            Ok(id) => Ok(id),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    pub async fn deposit_escrow(
        &self,
        escrow_id: u64,
        req: &DepositEscrowRequest,
    ) -> Result<(), LedgerError> {
        let result = self
            .submit(self.provider.deposit_escrow(escrow_id, req.amount))
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_buyer_error(escrow_id, e).await),
        }
    }

    pub async fn approve_escrow(&self, escrow_id: u64) -> Result<(), LedgerError> {
        let result = self.submit(self.provider.approve_escrow(escrow_id)).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    pub async fn reject_escrow(&self, escrow_id: u64) -> Result<(), LedgerError> {
        let result = self.submit(self.provider.reject_escrow(escrow_id)).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    pub async fn archive_escrow(&self, escrow_id: u64) -> Result<(), LedgerError> {
        let result = self.submit(self.provider.archive_escrow(escrow_id)).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    pub async fn change_agent(&self, req: &ChangeAgentRequest) -> Result<(), LedgerError> {
        req.validate().map_err(LedgerError::Validation)?;
        let result = self
            .submit(self.provider.change_agent(&req.new_agent))
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    pub async fn change_agent_fee_percentage(
        &self,
        req: &ChangeFeeRequest,
    ) -> Result<(), LedgerError> {
        req.validate().map_err(LedgerError::Validation)?;
        let result = self
            .submit(self.provider.change_agent_fee_percentage(req.new_fee))
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    pub async fn withdraw_funds(&self) -> Result<(), LedgerError> {
        let result = self.submit(self.provider.withdraw_funds()).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reclassify_agent_error(e).await),
        }
    }

    /// Run one write with the pending flag raised. The flag drops whether
    /// the submission succeeds or fails.
    async fn submit<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        self.pending.store(true, Ordering::SeqCst);
        let result = fut.await;
        self.pending.store(false, Ordering::SeqCst);
        result
    }

    /// A failed agent-only call usually means the connected account is not
    /// the agent. Check the cached agent address before passing the raw
    /// error through.
    async fn reclassify_agent_error(&self, err: LedgerError) -> LedgerError {
        let signer = self.signer.read().await;
        let model = self.read_model.read().await;
        match signer.as_deref() {
            Some(address) if !model.agent.is_empty() && address != model.agent => {
                debug!(signer = address, agent = %model.agent, "reclassifying write failure");
                LedgerError::Authorization(
                    "connected account is not the current agent".to_string(),
                )
            }
            _ => err,
        }
    }

    /// Same heuristic for deposits, against the escrow's recorded buyer.
    async fn reclassify_buyer_error(&self, escrow_id: u64, err: LedgerError) -> LedgerError {
        let signer = self.signer.read().await;
        let model = self.read_model.read().await;
        let buyer = model
            .escrows
            .iter()
            .find(|e| e.id == escrow_id)
            .map(|e| e.buyer.as_str());
        match (signer.as_deref(), buyer) {
            (Some(address), Some(buyer)) if address != buyer => LedgerError::Authorization(
                "connected account is not the buyer for this escrow".to_string(),
            ),
            _ => err,
        }
    }
}
