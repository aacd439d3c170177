//! Camera rigs: first/third person follow and the death orbit.
//!
//! Each rig computes a desired pose every frame; the selector blends the
//! actual camera toward the enabled rig with the highest priority. Turning
//! the death rig on therefore wins over the follow rig without either rig
//! knowing about the other.

use bevy::prelude::*;
use shared::PLAYER_HEIGHT;

use crate::input::CameraMode;

/// Camera offset from player position (eye level) for first person
const CAMERA_HEIGHT_OFFSET: f32 = PLAYER_HEIGHT * 0.4;

/// Third person orbit settings
const THIRD_PERSON_DISTANCE: f32 = 5.5;
const THIRD_PERSON_DEFAULT_PITCH: f32 = 0.25;

/// Death camera orbit
const DEATH_CAM_DISTANCE: f32 = 4.5;
const DEATH_CAM_HEIGHT: f32 = 2.5;
const DEATH_CAM_ORBIT_SPEED: f32 = 0.4;

/// How fast accumulated shake trauma decays (per second).
const SHAKE_DECAY: f32 = 1.8;
/// Maximum positional shake offset at full trauma (meters).
const SHAKE_MAX_OFFSET: f32 = 0.12;

/// One camera pose source. The selector reads these.
#[derive(Component)]
pub struct CameraRig {
    pub priority: i32,
    pub enabled: bool,
    pub pose: Transform,
}

/// Follows the local player (first or third person).
#[derive(Component)]
pub struct FollowRig;

/// Slow orbit around the corpse while the local player is dead.
#[derive(Component)]
pub struct DeathRig {
    /// The piece the orbit centers on (the corpse's torso).
    pub focus: Option<Entity>,
}

/// Screen shake driven by damage feedback.
#[derive(Resource, Default)]
pub struct CameraShake {
    trauma: f32,
}

impl CameraShake {
    /// Add feedback in [0, 1]; stacks up to full trauma.
    pub fn add_trauma(&mut self, amount: f32) {
        self.trauma = (self.trauma + amount).clamp(0.0, 1.0);
    }
}

/// Spawn the camera and both rigs.
pub fn spawn_camera_rigs(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 3.0, 8.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        FollowRig,
        CameraRig {
            priority: 0,
            enabled: true,
            pose: Transform::default(),
        },
    ));
    commands.spawn((
        DeathRig { focus: None },
        CameraRig {
            priority: 10,
            enabled: false,
            pose: Transform::default(),
        },
    ));
}

/// Update the follow rig from the local player's visual transform.
pub fn update_follow_rig(
    input_state: Res<crate::input::InputState>,
    player_query: Query<&Transform, (With<shared::LocalPlayer>, Without<CameraRig>)>,
    mut rigs: Query<&mut CameraRig, With<FollowRig>>,
) {
    let Some(player_transform) = player_query.iter().next() else {
        return;
    };
    let Ok(mut rig) = rigs.single_mut() else {
        return;
    };

    rig.pose = match input_state.camera_mode {
        CameraMode::FirstPerson => {
            let pos = player_transform.translation + Vec3::new(0.0, CAMERA_HEIGHT_OFFSET, 0.0);
            let rot = Quat::from_euler(EulerRot::YXZ, input_state.yaw, input_state.pitch, 0.0);
            Transform::from_translation(pos).with_rotation(rot)
        }
        CameraMode::ThirdPerson => {
            let orbit_pitch = (THIRD_PERSON_DEFAULT_PITCH - input_state.pitch * 0.6).clamp(-0.2, 1.3);
            let pivot = player_transform.translation + Vec3::new(0.0, PLAYER_HEIGHT * 0.5, 0.0);
            let cam_pos =
                orbit_position(pivot, input_state.yaw, orbit_pitch, THIRD_PERSON_DISTANCE);
            look_at_level(cam_pos, pivot)
        }
    };
}

/// Update the death rig: slow orbit around the corpse's torso.
pub fn update_death_rig(
    time: Res<Time>,
    transforms: Query<&GlobalTransform>,
    mut rigs: Query<(&DeathRig, &mut CameraRig)>,
) {
    let Ok((death, mut rig)) = rigs.single_mut() else {
        return;
    };
    if !rig.enabled {
        return;
    }
    let Some(focus_pos) = death
        .focus
        .and_then(|e| transforms.get(e).ok())
        .map(|t| t.translation())
    else {
        return;
    };

    let angle = time.elapsed_secs() * DEATH_CAM_ORBIT_SPEED;
    let cam_pos = focus_pos
        + Vec3::new(
            angle.cos() * DEATH_CAM_DISTANCE,
            DEATH_CAM_HEIGHT,
            angle.sin() * DEATH_CAM_DISTANCE,
        );
    rig.pose = look_at_level(cam_pos, focus_pos);
}

/// Pick the enabled rig with the highest priority and blend the camera
/// toward it, then add the shake offset on top.
pub fn select_camera_pose(
    time: Res<Time>,
    mut shake: ResMut<CameraShake>,
    rigs: Query<&CameraRig>,
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };
    let Some(rig) = rigs
        .iter()
        .filter(|r| r.enabled)
        .max_by_key(|r| r.priority)
    else {
        return;
    };

    // Mild smoothing removes micro-jitter from replication without making
    // the camera feel laggy.
    let cam_rate: f32 = 35.0;
    let cam_t = 1.0_f32 - (-cam_rate * time.delta_secs()).exp();
    camera_transform.translation = camera_transform.translation.lerp(rig.pose.translation, cam_t);
    camera_transform.rotation = camera_transform.rotation.slerp(rig.pose.rotation, cam_t);

    // Shake: squared trauma gives a soft onset and a sharp peak.
    shake.trauma = (shake.trauma - SHAKE_DECAY * time.delta_secs()).max(0.0);
    if shake.trauma > 0.0 {
        let t = time.elapsed_secs();
        let strength = shake.trauma * shake.trauma * SHAKE_MAX_OFFSET;
        camera_transform.translation += Vec3::new(
            (t * 37.0).sin() * strength,
            (t * 43.0).sin() * strength,
            0.0,
        );
    }
}

/// Calculate camera position orbiting around a pivot point
fn orbit_position(pivot: Vec3, yaw: f32, pitch: f32, distance: f32) -> Vec3 {
    let horizontal_dist = distance * pitch.cos();
    let behind_dir = Vec3::new(yaw.sin(), 0.0, yaw.cos());
    pivot + behind_dir * horizontal_dist + Vec3::new(0.0, distance * pitch.sin(), 0.0)
}

/// Create a rotation that looks at target while keeping the camera level
fn look_at_level(eye: Vec3, target: Vec3) -> Transform {
    Transform::from_translation(eye).looking_at(target, Vec3::Y)
}
