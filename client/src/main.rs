//! Game Client - Renders the world and handles player input
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod audio;
mod camera;
mod effects;
mod input;
mod ragdoll;
mod states;
mod systems;

use bevy::prelude::*;
use bevy::window::WindowResolution;
use bevy_rapier3d::prelude::{NoUserData, RapierPhysicsPlugin};
use lightyear::prelude::client::ClientPlugins;
use shared::{protocol::*, ProtocolPlugin, WorldGeometry, SERVER_ADDR, SERVER_PORT};
use states::GameState;

/// Marker component for our client entity
#[derive(Component)]
pub struct GameClient;

fn main() {
    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Locomotion Sandbox".to_string(),
            resolution: WindowResolution::new(1280, 720),
            ..default()
        }),
        ..default()
    }));

    // Game state machine
    app.init_state::<GameState>();

    // Lightyear client plugins (tick_duration = 60Hz)
    app.add_plugins(ClientPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);

    // Rapier simulates the rag-doll pieces; everything else is kinematic.
    app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());

    // Same walkable geometry the server simulates against; used for local
    // grounded recomputation.
    app.insert_resource(WorldGeometry::demo_arena());

    app.init_resource::<input::InputState>();
    app.init_resource::<camera::CameraShake>();
    app.init_resource::<effects::VignetteIntensity>();

    app.add_systems(
        Startup,
        (
            audio::setup_audio,
            camera::spawn_camera_rigs,
            effects::spawn_damage_vignette,
            systems::spawn_world,
        ),
    );

    // Connection systems (connect immediately on startup)
    app.add_systems(OnEnter(GameState::Connecting), systems::start_connection);
    app.add_systems(
        Update,
        systems::check_connection.run_if(in_state(GameState::Connecting)),
    );

    // Send input to server at fixed tick rate (60 Hz)
    app.add_systems(
        FixedUpdate,
        input::send_input_to_server.run_if(in_state(GameState::Playing)),
    );

    // Replication-driven spawn/setup must NOT be gated solely to `Playing`.
    // Initial snapshots can arrive while we're still in `Connecting`, which
    // would cause `Added<Player>` handlers to miss and leave ghost entities.
    app.add_systems(
        Update,
        (
            systems::handle_player_spawned,
            systems::ensure_local_player_tag,
        )
            .chain()
            .run_if(in_state(GameState::Connecting).or(in_state(GameState::Playing))),
    );

    // The per-frame character pipeline. Hard-chained: events mutate motion
    // state and flip rag-doll modes, the view pass feeds parameters, the
    // animator samples them, and only then do the camera rigs read poses.
    app.add_systems(
        Update,
        (
            input::handle_keyboard_input,
            input::handle_mouse_input,
            systems::grab_cursor,
            (
                ragdoll::refresh_ragdoll_centers,
                systems::receive_character_events,
                ragdoll::tick_ragdoll_rigs,
                systems::update_view_motion,
                systems::sync_player_transforms,
                systems::drive_character_rig,
                ragdoll::flush_ragdoll_ops,
                camera::update_follow_rig,
                camera::update_death_rig,
                camera::select_camera_pose,
            )
                .chain(),
        )
            .run_if(in_state(GameState::Playing)),
    );

    // Presentation extras
    app.add_systems(
        Update,
        (
            systems::update_local_model_visibility,
            effects::update_damage_vignette,
            effects::update_corpse_trails,
        )
            .run_if(in_state(GameState::Playing)),
    );

    info!("Starting client, server at {}:{}", SERVER_ADDR, SERVER_PORT);
    app.run();
}
