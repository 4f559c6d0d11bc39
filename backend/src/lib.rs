//! Escrow agent backend
//!
//! Serves a read model of the on-chain escrow contract over HTTP and
//! WebSocket, and relays writes through a signing gateway.

pub mod config;
pub mod error;
pub mod escrow;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod websocket;
