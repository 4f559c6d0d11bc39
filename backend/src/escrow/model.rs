use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Escrow lifecycle, mirroring the on-chain status enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Pending,
    Deposited,
    Approved,
    Rejected,
    Archived,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::Deposited => "deposited",
            EscrowStatus::Approved => "approved",
            EscrowStatus::Rejected => "rejected",
            EscrowStatus::Archived => "archived",
        }
    }
}

/// One escrow row of the read model, as served over the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    pub id: u64,
    pub seller: String,
    pub buyer: String,
    pub deposit_amount: i128,
    pub status: EscrowStatus,
    /// Fee percentage captured when the escrow was initiated. Later fee
    /// changes do not affect it.
    pub agent_fee_percentage: u32,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert ledger epoch seconds into a UTC timestamp, clamping anything
/// out of chrono's range to the epoch.
pub fn timestamp_to_datetime(secs: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

#[derive(Debug, Deserialize)]
pub struct InitiateEscrowRequest {
    pub seller: String,
    pub buyer: String,
    pub deposit_amount: i128,
    pub description: String,
}

impl InitiateEscrowRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.seller.trim().is_empty() {
            return Err("seller address is required".to_string());
        }
        if self.buyer.trim().is_empty() {
            return Err("buyer address is required".to_string());
        }
        if self.seller == self.buyer {
            return Err("seller and buyer must be different accounts".to_string());
        }
        if self.deposit_amount < 0 {
            return Err("deposit amount cannot be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct DepositEscrowRequest {
    pub amount: i128,
}

#[derive(Debug, Deserialize)]
pub struct ChangeAgentRequest {
    pub new_agent: String,
}

impl ChangeAgentRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.new_agent.trim().is_empty() {
            return Err("new agent address is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeFeeRequest {
    pub new_fee: u32,
}

impl ChangeFeeRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.new_fee > 99 {
            return Err("fee percentage must be between 0 and 99".to_string());
        }
        Ok(())
    }
}

/// Agent-side view of the contract state plus the sync layer's busy flag.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStateResponse {
    pub agent: String,
    pub agent_fee_percentage: u32,
    pub withdrawable_funds: i128,
    /// True while a submitted transaction is in flight.
    pub pending: bool,
}

/// Decoded contract event, as broadcast to WebSocket subscribers and fed
/// into the sync service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscrowEvent {
    Initiated {
        escrow_id: u64,
        seller: String,
        buyer: String,
        deposit_amount: i128,
        timestamp: u64,
    },
    Deposited {
        escrow_id: u64,
        timestamp: u64,
    },
    Approved {
        escrow_id: u64,
        timestamp: u64,
    },
    Rejected {
        escrow_id: u64,
        timestamp: u64,
    },
    Archived {
        escrow_id: u64,
        timestamp: u64,
    },
    FundsWithdrawn {
        amount: i128,
        timestamp: u64,
    },
    AgentChanged {
        agent: String,
        timestamp: u64,
    },
    FeeChanged {
        fee: u32,
        timestamp: u64,
    },
}

impl EscrowEvent {
    /// Escrow this event concerns, if any. Agent-level events return None
    /// and fan out to every subscriber.
    pub fn escrow_id(&self) -> Option<u64> {
        match self {
            EscrowEvent::Initiated { escrow_id, .. }
            | EscrowEvent::Deposited { escrow_id, .. }
            | EscrowEvent::Approved { escrow_id, .. }
            | EscrowEvent::Rejected { escrow_id, .. }
            | EscrowEvent::Archived { escrow_id, .. } => Some(*escrow_id),
            EscrowEvent::FundsWithdrawn { .. }
            | EscrowEvent::AgentChanged { .. }
            | EscrowEvent::FeeChanged { .. } => None,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            EscrowEvent::Initiated { timestamp, .. }
            | EscrowEvent::Deposited { timestamp, .. }
            | EscrowEvent::Approved { timestamp, .. }
            | EscrowEvent::Rejected { timestamp, .. }
            | EscrowEvent::Archived { timestamp, .. }
            | EscrowEvent::FundsWithdrawn { timestamp, .. }
            | EscrowEvent::AgentChanged { timestamp, .. }
            | EscrowEvent::FeeChanged { timestamp, .. } => *timestamp,
        }
    }
}
