//! `skirmish_client`
//!
//! The Endpoint role:
//! - Session management (reliable + unreliable channels, bounded connect)
//! - State reconciliation of inbound snapshots/assignments
//! - Local simulation via the shared integrator
//! - Per-tick input impulse emission

pub mod endpoint;
pub mod input;
pub mod reconcile;

pub use endpoint::SessionEndpoint;
