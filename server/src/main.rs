//! Game Server - Headless Bevy app, authoritative for character motion
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod combat;
mod systems;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
// UDP/Netcode types re-exported through prelude::server (when features enabled)
use shared::{
    get_server_bind_addr, protocol::*, ProtocolPlugin, WorldGeometry, PRIVATE_KEY, PROTOCOL_ID,
    SERVER_PORT,
};
use std::net::SocketAddr;

use systems::ClientInputs;

/// Marker for our server entity
#[derive(Component)]
struct GameServer;

/// Spawn the server entity with all required networking components
fn spawn_server(mut commands: Commands) {
    let bind_addr = get_server_bind_addr();
    let server_addr: SocketAddr = format!("{}:{}", bind_addr, SERVER_PORT)
        .parse()
        .expect("Invalid server bind address");

    info!("Spawning server entity, binding to {:?}", server_addr);

    // Spawn server entity with UDP + Netcode
    commands.spawn((
        GameServer,
        Server::default(),
        ServerUdpIo::default(),
        LocalAddr(server_addr),
        NetcodeServer::new(NetcodeConfig {
            protocol_id: PROTOCOL_ID,
            private_key: PRIVATE_KEY,
            ..default()
        }),
    ));
}

/// Start the server after it's spawned
fn start_server(
    mut commands: Commands,
    server_query: Query<Entity, (With<GameServer>, Without<Started>, Without<Starting>)>,
) {
    for server_entity in server_query.iter() {
        info!("Starting server...");
        // In Bevy 0.17 + Lightyear 0.25, trigger an EntityEvent
        commands.trigger(Start {
            entity: server_entity,
        });
    }
}

/// Check if server is started (run condition)
fn server_is_started(server_query: Query<(), (With<GameServer>, With<Started>)>) -> bool {
    !server_query.is_empty()
}

fn main() {
    let mut app = App::new();

    // Headless plugins (no rendering)
    // IMPORTANT: run the main loop at the same rate as our fixed tick.
    //
    // If the headless app runs "as fast as possible", Bevy will clear `MessageReceiver` buffers
    // every frame (in `Last`), but our gameplay systems read messages in `FixedUpdate`. When
    // frames >> fixed ticks, most input messages get cleared before `FixedUpdate` runs.
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick_duration())));
    app.add_plugins(bevy::log::LogPlugin::default());
    app.add_plugins(bevy::state::app::StatesPlugin);

    // Walkable geometry (authoritative ground collision; clients hold the
    // same data for local ground recomputation)
    app.insert_resource(WorldGeometry::demo_arena());

    // Server-side input cache
    app.init_resource::<ClientInputs>();

    // Lightyear server plugins (tick_duration = 60Hz)
    app.add_plugins(ServerPlugins {
        tick_duration: tick_duration(),
    });

    // Protocol plugin (component/message registration)
    app.add_plugins(ProtocolPlugin);

    app.add_systems(Startup, spawn_server);

    // Start server after spawning
    app.add_systems(Update, start_server);

    app.add_observer(systems::handle_disconnections);

    // Fixed tick: receive inputs, simulate everyone, then flush the event
    // queues. The relay runs last so every transition detected this tick
    // (jump, landing, fall damage, death, respawn) goes out in the order it
    // was pushed.
    app.add_systems(
        FixedUpdate,
        (
            systems::handle_connections,
            systems::receive_client_input,
            systems::simulate_characters,
            combat::check_player_deaths,
            combat::tick_respawn_timers,
            systems::relay_character_events,
        )
            .chain()
            .run_if(server_is_started),
    );

    info!("Starting server on port {}", SERVER_PORT);
    app.run();
}
