//! Client-side game systems
//!
//! Organized into submodules for maintainability.

mod connection;
mod events;
mod player;
mod world;

// Re-export everything for easy access from main.rs
pub use connection::*;
pub use events::*;
pub use player::*;
pub use world::*;
