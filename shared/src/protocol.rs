//! Lightyear network protocol definition
//!
//! Components replicate continuously (position/velocity/health); discrete
//! character transitions travel as messages on an ordered-reliable channel,
//! which gives the per-character FIFO the event broadcaster requires.

use bevy::prelude::*;
use lightyear::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::components::{Health, Player, PlayerPosition, PlayerRotation, PlayerStance, PlayerVelocity};
use crate::events::CharacterEvent;

// --- Input (for server-authoritative movement) ---

/// Player input sent from client to server each tick
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct PlayerInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Jump request (spacebar)
    pub jump: bool,
    pub sprint: bool,
    pub crouch: bool,
    /// Player's facing direction (yaw) for movement calculation
    pub yaw: f32,
}

// --- Messages ---

/// Server -> Client: one discrete transition on one character, relayed to
/// every participant (including the originator's view) in send order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct CharacterEventMessage {
    /// Stable id of the character's controlling peer.
    pub owner: u64,
    pub event: CharacterEvent,
}

// --- Channels ---

/// Reliable ordered channel: discrete character events. Per-sender FIFO.
pub struct EventChannel;

/// Unreliable channel for frequent input (lowest latency)
pub struct InputChannel;

// --- Protocol Plugin ---

pub struct ProtocolPlugin;

impl Plugin for ProtocolPlugin {
    fn build(&self, app: &mut App) {
        // === PLAYER COMPONENTS ===

        app.register_component::<Player>()
            .add_prediction();

        app.register_component::<PlayerPosition>()
            .add_prediction();

        app.register_component::<PlayerRotation>()
            .add_prediction();

        app.register_component::<PlayerVelocity>()
            .add_prediction();

        app.register_component::<PlayerStance>()
            .add_prediction();

        app.register_component::<Health>()
            .add_prediction();

        // === MESSAGES ===

        // Client -> Server
        app.register_message::<PlayerInput>()
            .add_direction(NetworkDirection::ClientToServer);

        // Server -> Client
        app.register_message::<CharacterEventMessage>()
            .add_direction(NetworkDirection::ServerToClient);

        // === CHANNELS ===

        app.add_channel::<EventChannel>(ChannelSettings {
            mode: ChannelMode::OrderedReliable(ReliableSettings::default()),
            ..default()
        })
        .add_direction(NetworkDirection::ServerToClient);

        app.add_channel::<InputChannel>(ChannelSettings {
            mode: ChannelMode::UnorderedUnreliable,
            ..default()
        })
        .add_direction(NetworkDirection::ClientToServer);
    }
}

// --- Network Configuration ---

pub const SERVER_PORT: u16 = 5000;
pub const SERVER_ADDR: &str = "127.0.0.1";
pub const PROTOCOL_ID: u64 = 0x6C6F636F6D6F74;

/// Server bind address - 0.0.0.0 works for local and deployed hosts alike.
pub fn get_server_bind_addr() -> &'static str {
    "0.0.0.0"
}

/// Shared private key for local development (use proper key management in production!)
pub const PRIVATE_KEY: [u8; 32] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
    0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
    0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
    0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x20,
];

/// Fixed timestep for physics/game logic (60 Hz)
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Tick duration for lightyear plugins
pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}

/// Helper to convert PeerId to a stable u64 for event addressing
pub fn peer_id_to_u64(peer_id: PeerId) -> u64 {
    match peer_id {
        PeerId::Netcode(id) => id,
        PeerId::Steam(id) => id,
        PeerId::Local(id) => id,
        PeerId::Entity(id) => id,
        PeerId::Raw(addr) => {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            addr.hash(&mut hasher);
            hasher.finish()
        }
        PeerId::Server => 0,
    }
}
