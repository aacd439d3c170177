//! Connection systems
//!
//! Networking, connection handling and cursor management.

use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};
use lightyear::prelude::client::*;
use lightyear::prelude::*;
use shared::{CharacterEventMessage, PlayerInput, PRIVATE_KEY, PROTOCOL_ID, SERVER_ADDR, SERVER_PORT};
use std::net::SocketAddr;

use crate::states::GameState;

/// Start connection to server
/// In Lightyear 0.25, we spawn a Client entity with the appropriate networking components
/// and then trigger the Connect event to initiate the connection
pub fn start_connection(
    mut commands: Commands,
    existing_clients: Query<Entity, With<crate::GameClient>>,
) {
    info!("Initiating connection to server at {}:{}...", SERVER_ADDR, SERVER_PORT);

    // Ensure we only ever have ONE GameClient entity.
    // If we keep spawning new ones on each connect attempt, `Query::single()` calls
    // will start failing and gameplay silently stops working.
    for e in existing_clients.iter() {
        commands.entity(e).despawn();
    }

    let server_addr: SocketAddr = format!("{}:{}", SERVER_ADDR, SERVER_PORT)
        .parse()
        .expect("Invalid server address");
    let local_addr: SocketAddr = "0.0.0.0:0".parse().expect("Invalid local bind address");

    // Generate a unique client ID
    let client_id = rand::random::<u64>();

    // Build authentication (netcode connect token)
    let auth = Authentication::Manual {
        server_addr,
        protocol_id: PROTOCOL_ID,
        private_key: PRIVATE_KEY,
        client_id,
    };

    // Spawn client entity with UDP + Netcode
    let client_entity = commands
        .spawn((
            crate::GameClient,
            Client::default(),
            UdpIo::default(),
            LocalAddr(local_addr),
            PeerAddr(server_addr),
            NetcodeClient::new(auth, NetcodeConfig::default())
                .expect("Failed to create netcode client"),
            // IMPORTANT: enable replication receive on this client.
            // Without this, the client will never receive `Player` etc.
            ReplicationReceiver::default(),
            // Client -> Server
            MessageSender::<PlayerInput>::default(),
            // Server -> Client
            MessageReceiver::<CharacterEventMessage>::default(),
        ))
        .id();

    // Trigger the Connect event to actually initiate the connection
    commands.trigger(Connect {
        entity: client_entity,
    });

    info!("Client entity spawned, client_id: {}", client_id);
}

/// Check connection status
/// In Lightyear 0.25, we query for Connected/Disconnected components on the client entity
pub fn check_connection(
    mut next_state: ResMut<NextState<GameState>>,
    new_connections: Query<Entity, (With<crate::GameClient>, Added<Connected>)>,
    new_disconnections: Query<Entity, (With<crate::GameClient>, Added<Disconnected>)>,
) {
    for _entity in new_connections.iter() {
        info!("Connected to server!");
        next_state.set(GameState::Playing);
    }

    for _entity in new_disconnections.iter() {
        warn!("Connection failed or disconnected");
        next_state.set(GameState::Connecting);
    }
}

/// Grab cursor for FPS controls
pub fn grab_cursor(
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
    mouse_button: Res<ButtonInput<MouseButton>>,
) {
    let Ok(window_entity) = windows.single() else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Ok(mut cursor) = cursor_opts.get_mut(window_entity) {
            cursor.grab_mode = CursorGrabMode::Locked;
            cursor.visible = false;
        }
    }
}
