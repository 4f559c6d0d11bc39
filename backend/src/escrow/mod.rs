pub mod event_listener;
pub mod model;
pub mod service;

pub use event_listener::EventListener;
pub use model::{
    timestamp_to_datetime, AgentStateResponse, ChangeAgentRequest, ChangeFeeRequest,
    DepositEscrowRequest, Escrow, EscrowEvent, EscrowStatus, InitiateEscrowRequest,
};
pub use service::EscrowSyncService;
