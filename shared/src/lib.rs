//! Shared gameplay core used by both server and client.
//!
//! Everything that must behave identically on every participant lives here:
//! the ground-state tracker, the animation parameter feeder, the discrete
//! event broadcaster core, the rag-doll mode switch, and the character
//! physics step. The server and client crates only wire these into their
//! respective Bevy apps.

pub mod animation;
pub mod components;
pub mod events;
pub mod motion;
pub mod physics;
pub mod player;
pub mod protocol;
pub mod ragdoll;
pub mod schedule;

pub use animation::*;
pub use components::*;
pub use events::*;
pub use motion::*;
pub use physics::*;
pub use player::*;
pub use protocol::*;
pub use ragdoll::*;
pub use schedule::*;
