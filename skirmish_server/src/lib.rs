//! `skirmish_server`
//!
//! The Authority role:
//! - Fixed timestep simulation loop over the shared integrator
//! - Uid assignment and session setup for connecting clients
//! - Receives `InputImpulse`s and applies them to the owning player
//! - Broadcasts `WorldSnapshot`s
//!
//! Networking model:
//! - TCP: handshake/control plane
//! - UDP: gameplay plane (impulses in, snapshots out)

pub mod server;

pub use server::GameServer;
