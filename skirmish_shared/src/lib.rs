//! `skirmish_shared`
//!
//! Game core shared by the client endpoint and the authoritative server.
//!
//! Design goals:
//! - Deterministic simulation: identical inputs produce bit-identical state.
//! - Clear separation of concerns (grid, entities, physics, net, config).
//! - All tuning passed in explicitly; nothing read from ambient globals.
//! - No `unsafe`.

pub mod config;
pub mod entity;
pub mod grid;
pub mod net;
pub mod physics;
pub mod resolution;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::grid::*;
    pub use crate::net::*;
    pub use crate::physics::*;
    pub use crate::resolution::*;
}
