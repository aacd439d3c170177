//! Visual world: lights and the walkable geometry meshes.
//!
//! The meshes are generated from the same `WorldGeometry` resource the
//! server simulates against, so what the player sees is exactly what the
//! authority collides with.

use bevy::prelude::*;
use shared::WorldGeometry;

/// Root of the spawned world visuals.
#[derive(Component)]
pub struct ClientWorldRoot;

/// Extent of the visible ground plane (meters).
const GROUND_EXTENT: f32 = 120.0;

/// Spawn the visual world
pub fn spawn_world(
    mut commands: Commands,
    world_roots: Query<Entity, With<ClientWorldRoot>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    world: Res<WorldGeometry>,
) {
    if !world_roots.is_empty() {
        return;
    }

    let root = commands
        // Parent of ground/platforms/lights. It must have GlobalTransform
        // or Bevy will emit B0004 warnings for children.
        .spawn((
            ClientWorldRoot,
            Transform::default(),
            GlobalTransform::default(),
            Visibility::default(),
            InheritedVisibility::default(),
        ))
        .id();

    // --- Sun light ---
    let sun = commands
        .spawn((
            DirectionalLight {
                illuminance: 12_000.0,
                shadows_enabled: true,
                ..default()
            },
            Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
        ))
        .id();
    commands.entity(root).add_child(sun);

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.8, 0.85, 1.0),
        brightness: 120.0,
        affects_lightmapped_meshes: true,
    });
    commands.insert_resource(ClearColor(Color::srgb(0.45, 0.6, 0.8)));

    // --- Ground plane ---
    let ground_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.35, 0.42, 0.3),
        perceptual_roughness: 0.95,
        ..default()
    });
    let ground = commands
        .spawn((
            Mesh3d(meshes.add(Plane3d::default().mesh().size(GROUND_EXTENT, GROUND_EXTENT))),
            MeshMaterial3d(ground_material),
            Transform::default(),
        ))
        .id();
    commands.entity(root).add_child(ground);

    // --- Platforms ---
    let platform_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.5, 0.45, 0.4),
        perceptual_roughness: 0.8,
        ..default()
    });
    for platform in &world.platforms {
        let size = platform.max - platform.min;
        let center = (platform.min + platform.max) * 0.5;
        let slab = commands
            .spawn((
                Mesh3d(meshes.add(Cuboid::new(size.x, platform.height, size.y))),
                MeshMaterial3d(platform_material.clone()),
                Transform::from_xyz(center.x, platform.height * 0.5, center.y),
            ))
            .id();
        commands.entity(root).add_child(slab);
    }
}
