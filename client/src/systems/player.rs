//! Character views: rig spawning, per-view motion tracking, the procedural
//! animator and transform sync.
//!
//! Every replicated character gets its own ground tracker and parameter set
//! on this client; continuous animation state is recomputed locally from
//! replicated position/velocity instead of being trusted from the wire.
//! Discrete triggers arrive separately as broadcast events.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use lightyear::prelude::*;
use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use shared::{
    feed_animation_params, is_grounded_at, track_ground, AnimationParams, CharacterMotionState,
    FeederInput, GroundSample, LocalPlayer, ParamKey, Player, PlayerPosition, PlayerRotation,
    PlayerStance, PlayerVelocity, WorldGeometry, PLAYER_SPRINT_SPEED,
};

use crate::input::{CameraMode, InputState};
use crate::ragdoll::{CharacterRagdoll, PieceProxy};

/// Index of the torso in the rig's piece list (death camera / trail focus).
pub const TORSO_PIECE: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RigSlot {
    Torso,
    Head,
    ArmLeft,
    ArmRight,
    LegLeft,
    LegRight,
}

/// One primitive piece of a character rig. `pivot` is the joint the piece
/// swings around, `offset` the piece center relative to that joint; both in
/// capsule-center space.
#[derive(Component)]
pub struct RigPart {
    pub owner: Entity,
    pub slot: RigSlot,
    pub pivot: Vec3,
    pub offset: Vec3,
}

/// Child root holding the rig pieces (toggled for first-person visibility).
#[derive(Component)]
pub struct CharacterModelRoot;

/// Marker for the local player's model root
#[derive(Component)]
pub struct LocalPlayerModel;

/// Walk-cycle phase, advanced by the animator.
#[derive(Component, Default)]
pub struct RigPhase {
    pub phase: f32,
}

/// Last observed yaw, for the feeder's yaw-delta input.
#[derive(Component, Default)]
pub struct ViewYaw {
    pub last: f32,
    pub initialized: bool,
}

struct PartDef {
    slot: RigSlot,
    pivot: Vec3,
    offset: Vec3,
    size: Vec3,
}

/// Blocky rig layout. The capsule center sits `PLAYER_HEIGHT * 0.5` above
/// the feet, so everything here is relative to that center.
fn rig_part_defs() -> [PartDef; 6] {
    [
        PartDef {
            slot: RigSlot::Torso,
            pivot: Vec3::new(0.0, 0.12, 0.0),
            offset: Vec3::ZERO,
            size: Vec3::new(0.44, 0.7, 0.26),
        },
        PartDef {
            slot: RigSlot::Head,
            pivot: Vec3::new(0.0, 0.47, 0.0),
            offset: Vec3::new(0.0, 0.15, 0.0),
            size: Vec3::new(0.26, 0.26, 0.26),
        },
        PartDef {
            slot: RigSlot::ArmLeft,
            pivot: Vec3::new(-0.28, 0.4, 0.0),
            offset: Vec3::new(0.0, -0.33, 0.0),
            size: Vec3::new(0.12, 0.62, 0.12),
        },
        PartDef {
            slot: RigSlot::ArmRight,
            pivot: Vec3::new(0.28, 0.4, 0.0),
            offset: Vec3::new(0.0, -0.33, 0.0),
            size: Vec3::new(0.12, 0.62, 0.12),
        },
        PartDef {
            slot: RigSlot::LegLeft,
            pivot: Vec3::new(-0.12, -0.16, 0.0),
            offset: Vec3::new(0.0, -0.37, 0.0),
            size: Vec3::new(0.15, 0.72, 0.15),
        },
        PartDef {
            slot: RigSlot::LegRight,
            pivot: Vec3::new(0.12, -0.16, 0.0),
            offset: Vec3::new(0.0, -0.37, 0.0),
            size: Vec3::new(0.15, 0.72, 0.15),
        },
    ]
}

// =============================================================================
// PLAYER SPAWNING
// =============================================================================

/// Handle player spawn visuals
pub fn handle_player_spawned(
    mut commands: Commands,
    time: Res<Time>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    // In Lightyear 0.25, `LocalId` on the client entity refers to US
    client_query: Query<&LocalId, (With<crate::GameClient>, With<Connected>)>,
    new_players: Query<(Entity, &Player, &PlayerPosition), Added<Player>>,
) {
    let our_peer_id = client_query.iter().next().map(|r| r.0);

    for (entity, player, position) in new_players.iter() {
        info!("Player spawned: {:?}", player.client_id);

        let is_local = our_peer_id.map(|id| player.client_id == id).unwrap_or(false);

        // The replicated player entity is server-authoritative; we only add
        // visuals and per-view state here.
        // IMPORTANT: Full spatial bundle (including GlobalTransform) to avoid
        // B0004 warnings when the model hierarchy is spawned as children.
        commands.entity(entity).insert((
            Transform::from_translation(position.0),
            GlobalTransform::from_translation(position.0),
            Visibility::Inherited,
            InheritedVisibility::default(),
            CharacterMotionState::spawned_at(time.elapsed_secs_f64()),
            AnimationParams::default(),
            ViewYaw::default(),
            RigPhase::default(),
        ));

        let body_color = if is_local {
            Color::srgb(0.25, 0.45, 0.8)
        } else {
            Color::srgb(0.75, 0.3, 0.25)
        };
        let body_material = materials.add(StandardMaterial {
            base_color: body_color,
            perceptual_roughness: 0.8,
            ..default()
        });

        let model_entity = commands
            .spawn((
                CharacterModelRoot,
                Transform::default(),
                GlobalTransform::default(),
                Visibility::Inherited,
                InheritedVisibility::default(),
            ))
            .id();
        commands.entity(entity).add_child(model_entity);

        // Spawn the rig pieces, torso first (see TORSO_PIECE). Each piece
        // carries its rapier body, kinematic and non-colliding until the
        // rag-doll switch flips it.
        let mut pieces = Vec::new();
        for def in rig_part_defs() {
            let rest = def.pivot + def.offset;
            let piece = commands
                .spawn((
                    RigPart {
                        owner: entity,
                        slot: def.slot,
                        pivot: def.pivot,
                        offset: def.offset,
                    },
                    Mesh3d(meshes.add(Cuboid::new(def.size.x, def.size.y, def.size.z))),
                    MeshMaterial3d(body_material.clone()),
                    Transform::from_translation(rest),
                    RigidBody::KinematicPositionBased,
                    Collider::cuboid(def.size.x * 0.5, def.size.y * 0.5, def.size.z * 0.5),
                    Velocity::default(),
                    ColliderDisabled,
                ))
                .id();
            commands.entity(model_entity).add_child(piece);
            pieces.push(PieceProxy::new(piece, position.0 + rest));
        }
        commands.entity(entity).insert(CharacterRagdoll::new(pieces));

        if is_local {
            commands.entity(entity).insert(LocalPlayer);
            commands.entity(model_entity).insert(LocalPlayerModel);
            info!("Local player spawned!");
        }
    }
}

/// Ensure exactly one `Player` entity is tagged as `LocalPlayer`.
///
/// The first replicated `Player` can arrive while we're still connecting,
/// and on higher-latency links component insertion order can vary; this
/// converges the tag onto the correct entity regardless of timing.
pub fn ensure_local_player_tag(
    mut commands: Commands,
    client_query: Query<&LocalId, (With<crate::GameClient>, With<Connected>)>,
    players: Query<(Entity, &Player)>,
    existing_local: Query<Entity, With<LocalPlayer>>,
    children_q: Query<&Children>,
    model_roots: Query<Entity, With<CharacterModelRoot>>,
    existing_local_models: Query<Entity, With<LocalPlayerModel>>,
) {
    let Some(our_peer_id) = client_query.iter().next().map(|r| r.0) else {
        return;
    };

    let Some(local_entity) = players
        .iter()
        .find(|(_, p)| p.client_id == our_peer_id)
        .map(|(e, _)| e)
    else {
        return;
    };

    for e in existing_local.iter() {
        if e != local_entity {
            commands.entity(e).remove::<LocalPlayer>();
        }
    }
    commands.entity(local_entity).insert(LocalPlayer);

    // Converge the model tag as well (the child may not exist yet if the
    // spawn handler ran this frame).
    let mut local_model_root = None;
    if let Ok(children) = children_q.get(local_entity) {
        for child in children.iter() {
            if model_roots.get(child).is_ok() {
                local_model_root = Some(child);
                break;
            }
        }
    }
    if let Some(model_root) = local_model_root {
        for e in existing_local_models.iter() {
            if e != model_root {
                commands.entity(e).remove::<LocalPlayerModel>();
            }
        }
        commands.entity(model_root).insert(LocalPlayerModel);
    }
}

// =============================================================================
// PER-VIEW MOTION + PARAMETER FEED
// =============================================================================

fn wrap_angle(a: f32) -> f32 {
    (a + PI).rem_euclid(TAU) - PI
}

/// Run the ground tracker and the parameter feeder for every character view.
///
/// The tracker's landing edges are deliberately dropped here: discrete
/// triggers only ever come from broadcast events, so every participant sees
/// the same trigger sequence. This pass supplies the continuous state.
pub fn update_view_motion(
    time: Res<Time>,
    world: Res<WorldGeometry>,
    mut characters: Query<(
        &PlayerPosition,
        &PlayerRotation,
        &PlayerVelocity,
        &PlayerStance,
        &CharacterRagdoll,
        &mut CharacterMotionState,
        &mut AnimationParams,
        &mut ViewYaw,
    )>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    for (position, rotation, velocity, stance, ragdoll, mut motion, mut params, mut view_yaw) in
        characters.iter_mut()
    {
        // Corpses aren't animated; their params stay frozen until respawn.
        if ragdoll.rig.is_ragdoll() {
            continue;
        }

        let sample = GroundSample {
            grounded: is_grounded_at(&world, position.0),
            vertical_velocity: velocity.0.y,
            vertical_position: position.0.y,
        };
        let _ = track_ground(&mut motion, sample);

        if !view_yaw.initialized {
            view_yaw.last = rotation.0;
            view_yaw.initialized = true;
        }
        let yaw_delta = wrap_angle(rotation.0 - view_yaw.last);
        view_yaw.last = rotation.0;

        feed_animation_params(
            &mut params,
            &motion,
            &FeederInput {
                world_velocity: velocity.0,
                yaw: rotation.0,
                yaw_delta,
                max_speed: PLAYER_SPRINT_SPEED,
                crouching: stance.crouching,
            },
            dt,
        );
    }
}

// =============================================================================
// TRANSFORM SYNC + ANIMATOR
// =============================================================================

/// Sync character root transforms from replicated state.
pub fn sync_player_transforms(
    time: Res<Time>,
    mut players: Query<(
        &PlayerPosition,
        &PlayerRotation,
        &CharacterRagdoll,
        &mut Transform,
    )>,
) {
    let dt = time.delta_secs();
    let pos_rate: f32 = 22.0;
    let rot_rate: f32 = 26.0;
    let t_pos = 1.0_f32 - (-pos_rate * dt).exp();
    let t_rot = 1.0_f32 - (-rot_rate * dt).exp();

    for (position, rotation, ragdoll, mut transform) in players.iter_mut() {
        // While rag-dolled the pieces simulate freely; the root stays put so
        // it doesn't drag them along.
        if ragdoll.rig.is_ragdoll() {
            continue;
        }
        transform.translation = transform.translation.lerp(position.0, t_pos);
        let target_rot = Quat::from_rotation_y(rotation.0);
        transform.rotation = transform.rotation.slerp(target_rot, t_rot);
    }
}

struct PoseInput {
    swing: f32,
    speed: f32,
    look: f32,
    crouching: bool,
    falling: bool,
    land: bool,
    jump: bool,
}

/// Drive the rig pieces from the animation parameters.
///
/// This is the external sampler: it only reads `AnimationParams` and never
/// clears triggers. Pieces whose rig has stopped animator sampling (rag-doll
/// hand-off elapsed) are left entirely to the physics.
pub fn drive_character_rig(
    time: Res<Time>,
    mut characters: Query<(Entity, &AnimationParams, &CharacterRagdoll, &mut RigPhase)>,
    mut parts: Query<(&RigPart, &mut Transform)>,
) {
    let dt = time.delta_secs();

    let mut poses: HashMap<Entity, PoseInput> = HashMap::new();
    for (entity, params, ragdoll, mut phase) in characters.iter_mut() {
        if !ragdoll.rig.animator_active() {
            continue;
        }
        let move_x = params.float(ParamKey::MoveX);
        let move_y = params.float(ParamKey::MoveY);
        let speed = Vec2::new(move_x, move_y).length().min(1.0);
        if speed > 0.02 {
            phase.phase += dt * (4.0 + 6.0 * speed);
        }
        poses.insert(
            entity,
            PoseInput {
                swing: phase.phase.sin(),
                speed,
                look: params.float(ParamKey::LookX),
                crouching: params.flag(ParamKey::IsCrouching),
                falling: params.flag(ParamKey::IsFalling),
                land: params.trigger(ParamKey::Land),
                jump: params.trigger(ParamKey::Jump),
            },
        );
    }

    for (part, mut transform) in parts.iter_mut() {
        let Some(pose) = poses.get(&part.owner) else {
            continue;
        };

        let swing = pose.swing * 0.7 * pose.speed;
        let crouch_drop = if pose.crouching { 0.28 } else { 0.0 };

        let (rotation, drop) = match part.slot {
            RigSlot::Torso => {
                let pitch = if pose.crouching { 0.25 } else { 0.0 };
                (
                    Quat::from_euler(EulerRot::YXZ, 0.0, pitch, -pose.look * 0.15),
                    crouch_drop,
                )
            }
            RigSlot::Head => (Quat::from_rotation_z(-pose.look * 0.08), crouch_drop),
            RigSlot::ArmLeft | RigSlot::ArmRight => {
                let rot = if pose.falling {
                    // Arms raised while airborne.
                    Quat::from_rotation_x(-2.4)
                } else {
                    let side = if part.slot == RigSlot::ArmLeft { 1.0 } else { -1.0 };
                    Quat::from_rotation_x(swing * side)
                };
                (rot, crouch_drop)
            }
            RigSlot::LegLeft | RigSlot::LegRight => {
                let rot = if pose.falling {
                    // Legs tucked.
                    Quat::from_rotation_x(0.5)
                } else {
                    let side = if part.slot == RigSlot::LegLeft { -1.0 } else { 1.0 };
                    Quat::from_rotation_x(swing * side)
                };
                // Feet stay planted when crouching; the legs just bend.
                (rot, 0.0)
            }
        };

        let mut scale = Vec3::ONE;
        if part.slot == RigSlot::Torso {
            if pose.land {
                scale.y = 0.9;
            } else if pose.jump {
                scale.y = 1.07;
            }
        }

        transform.translation = part.pivot - Vec3::new(0.0, drop, 0.0) + rotation * part.offset;
        transform.rotation = rotation;
        transform.scale = scale;
    }
}

/// Update local player model visibility.
///
/// First person hides the whole rig so it doesn't block the view (the
/// renderer has no shadow-only mode, so hidden is the mapping). While dead
/// the corpse is always shown: the death camera frames it.
pub fn update_local_model_visibility(
    input_state: Res<InputState>,
    local_ragdolls: Query<&CharacterRagdoll, With<LocalPlayer>>,
    mut local_model: Query<&mut Visibility, With<LocalPlayerModel>>,
) {
    let Ok(mut visibility) = local_model.single_mut() else {
        return;
    };
    let dead = local_ragdolls
        .iter()
        .next()
        .map(|r| r.rig.is_ragdoll())
        .unwrap_or(false);

    let desired = if dead || input_state.camera_mode == CameraMode::ThirdPerson {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    if *visibility != desired {
        *visibility = desired;
    }
}
