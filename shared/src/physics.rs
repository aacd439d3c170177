//! Shared character-controller style physics.
//!
//! Goals:
//! - Server-authoritative simulation (single source of truth)
//! - Deterministic ground collision against static world geometry
//! - Runs at a fixed timestep (see `FIXED_TIMESTEP_HZ`)
//!
//! Clients run the same ground test against the same geometry, which is what
//! lets every view recompute grounded state locally instead of trusting the
//! wire. The rag-doll bodies are the only part simulated by a real
//! rigid-body solver, and that lives client-side.

use bevy::prelude::*;

use crate::motion::{CharacterMotionState, GroundSample};
use crate::player::{PLAYER_HEIGHT, PLAYER_SPRINT_SPEED, PLAYER_WALK_SPEED};
use crate::protocol::PlayerInput;
use crate::{PlayerPosition, PlayerRotation, PlayerVelocity};

/// Gravity in m/s^2 (negative Y).
/// Slightly stronger than real-world for snappier game feel.
pub const GRAVITY: f32 = -18.0;

/// Horizontal acceleration in m/s^2.
pub const MOVE_ACCEL: f32 = 45.0;

/// Horizontal deceleration when no input ("friction") in m/s^2.
pub const MOVE_BRAKE: f32 = 55.0;

/// How close to the ground we "snap" when falling (prevents tiny hovering).
pub const GROUND_SNAP_DISTANCE: f32 = 0.35;

/// Jump velocity in m/s (upward).
pub const JUMP_VELOCITY: f32 = 7.5;

/// Minimum Y for the capsule center above ground.
#[inline]
pub fn ground_clearance_center() -> f32 {
    PLAYER_HEIGHT * 0.5
}

/// A flat raised slab the character can stand on.
#[derive(Clone, Copy, Debug)]
pub struct Platform {
    pub min: Vec2,
    pub max: Vec2,
    pub height: f32,
}

impl Platform {
    fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.y && z <= self.max.y
    }
}

/// Static walkable geometry, identical on server and every client.
#[derive(Resource, Clone, Debug, Default)]
pub struct WorldGeometry {
    pub platforms: Vec<Platform>,
}

impl WorldGeometry {
    /// Ground plane at y = 0 plus a few platforms to jump and fall from.
    pub fn demo_arena() -> Self {
        Self {
            platforms: vec![
                Platform {
                    min: Vec2::new(4.0, -3.0),
                    max: Vec2::new(10.0, 3.0),
                    height: 1.5,
                },
                Platform {
                    min: Vec2::new(12.0, -3.0),
                    max: Vec2::new(18.0, 3.0),
                    height: 4.0,
                },
                // High ledge: falling off this one hurts.
                Platform {
                    min: Vec2::new(-14.0, -4.0),
                    max: Vec2::new(-6.0, 4.0),
                    height: 8.0,
                },
            ],
        }
    }

    /// Height of the walkable surface under (x, z).
    pub fn ground_height(&self, x: f32, z: f32) -> f32 {
        self.platforms
            .iter()
            .filter(|p| p.contains(x, z))
            .map(|p| p.height)
            .fold(0.0, f32::max)
    }
}

/// Outcome of one fixed tick of character physics.
#[derive(Clone, Copy, Debug)]
pub struct StepOutcome {
    /// A jump launched this tick (authority should broadcast it).
    pub jumped: bool,
    /// What the collision volume reported, for the ground tracker.
    pub sample: GroundSample,
}

/// Step the player character one fixed tick.
///
/// - Updates rotation from input yaw
/// - Applies acceleration/braking on the XZ plane (walk or sprint speed)
/// - Launches a jump when requested and grounded
/// - Applies gravity and collides against the walkable geometry
pub fn step_character(
    input: &PlayerInput,
    world: &WorldGeometry,
    position: &mut PlayerPosition,
    rotation: &mut PlayerRotation,
    velocity: &mut PlayerVelocity,
    motion: &CharacterMotionState,
    dt: f32,
) -> StepOutcome {
    // --- Facing ---
    rotation.0 = input.yaw;

    // --- Desired horizontal movement ---
    // In Bevy: +X right, +Y up, -Z forward.
    let forward = Vec3::new(-rotation.0.sin(), 0.0, -rotation.0.cos());
    let right = Vec3::new(rotation.0.cos(), 0.0, -rotation.0.sin());

    let mut move_dir = Vec3::ZERO;
    if input.forward {
        move_dir += forward;
    }
    if input.backward {
        move_dir -= forward;
    }
    if input.right {
        move_dir += right;
    }
    if input.left {
        move_dir -= right;
    }

    if move_dir.length_squared() > 0.0 {
        move_dir = move_dir.normalize();
    }

    let speed = if input.sprint && !input.crouch {
        PLAYER_SPRINT_SPEED
    } else {
        PLAYER_WALK_SPEED
    };
    let desired_horiz = move_dir * speed;
    let mut horiz = Vec3::new(velocity.0.x, 0.0, velocity.0.z);

    // Accelerate toward desired velocity.
    let delta = desired_horiz - horiz;
    let accel = if move_dir.length_squared() > 0.0 {
        MOVE_ACCEL
    } else {
        MOVE_BRAKE
    };
    let max_change = accel * dt;

    if delta.length_squared() > 0.0 {
        let delta_len = delta.length();
        if delta_len <= max_change {
            horiz = desired_horiz;
        } else {
            horiz += delta * (max_change / delta_len);
        }
    }

    velocity.0.x = horiz.x;
    velocity.0.z = horiz.z;

    // --- Jump ---
    // Grounded state comes from last tick's tracker; only the authority's
    // input can launch, and the launch is what gets broadcast.
    let mut jumped = false;
    if input.jump && motion.grounded && velocity.0.y < 1.0 {
        velocity.0.y = JUMP_VELOCITY;
        jumped = true;
    }

    // --- Gravity ---
    velocity.0.y += GRAVITY * dt;

    // --- Integrate ---
    position.0 += velocity.0 * dt;

    // The tracker measures fall height from the airborne peak, so the sample
    // carries the pre-snap vertical velocity.
    let vertical_velocity = velocity.0.y;

    // --- Ground collision ---
    let ground_y = world.ground_height(position.0.x, position.0.z);
    let target_y = ground_y + ground_clearance_center();

    let mut grounded_now = false;

    // Snap if we are below ground, or very close and falling.
    if position.0.y < target_y {
        position.0.y = target_y;
        if velocity.0.y < 0.0 {
            velocity.0.y = 0.0;
        }
        grounded_now = true;
    } else if velocity.0.y <= 0.0 && (position.0.y - target_y) < GROUND_SNAP_DISTANCE {
        position.0.y = target_y;
        velocity.0.y = 0.0;
        grounded_now = true;
    }

    StepOutcome {
        jumped,
        sample: GroundSample {
            grounded: grounded_now,
            vertical_velocity,
            vertical_position: position.0.y,
        },
    }
}

/// Local ground test used by observer views (same snap rule as the step).
pub fn is_grounded_at(world: &WorldGeometry, position: Vec3) -> bool {
    let target_y = world.ground_height(position.x, position.z) + ground_clearance_center();
    position.y - target_y < GROUND_SNAP_DISTANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::track_ground;

    const DT: f32 = 1.0 / 60.0;

    fn idle_input() -> PlayerInput {
        PlayerInput::default()
    }

    fn standing_start(world: &WorldGeometry) -> (PlayerPosition, PlayerRotation, PlayerVelocity) {
        let y = world.ground_height(0.0, 0.0) + ground_clearance_center();
        (
            PlayerPosition(Vec3::new(0.0, y, 0.0)),
            PlayerRotation(0.0),
            PlayerVelocity(Vec3::ZERO),
        )
    }

    #[test]
    fn test_idle_character_stays_grounded() {
        let world = WorldGeometry::default();
        let (mut pos, mut rot, mut vel) = standing_start(&world);
        let motion = CharacterMotionState::default();

        for _ in 0..30 {
            let outcome =
                step_character(&idle_input(), &world, &mut pos, &mut rot, &mut vel, &motion, DT);
            assert!(outcome.sample.grounded);
            assert!(!outcome.jumped);
        }
        assert_eq!(pos.0.y, ground_clearance_center());
    }

    #[test]
    fn test_jump_requires_grounded() {
        let world = WorldGeometry::default();
        let (mut pos, mut rot, mut vel) = standing_start(&world);
        let mut input = idle_input();
        input.jump = true;

        let mut airborne = CharacterMotionState::default();
        airborne.grounded = false;
        let outcome =
            step_character(&input, &world, &mut pos, &mut rot, &mut vel, &airborne, DT);
        assert!(!outcome.jumped);

        let (mut pos, mut rot, mut vel) = standing_start(&world);
        let grounded = CharacterMotionState::default();
        let outcome =
            step_character(&input, &world, &mut pos, &mut rot, &mut vel, &grounded, DT);
        assert!(outcome.jumped);
        assert!(vel.0.y > 0.0);
    }

    #[test]
    fn test_jump_arc_lands_with_single_edge() {
        let world = WorldGeometry::default();
        let (mut pos, mut rot, mut vel) = standing_start(&world);
        let mut motion = CharacterMotionState::default();

        let mut jump_input = idle_input();
        jump_input.jump = true;

        let mut landings = 0;
        for tick in 0..240 {
            let input = if tick == 0 { &jump_input } else {
                // Only hold jump for the launch tick.
                &idle_input()
            };
            let outcome =
                step_character(input, &world, &mut pos, &mut rot, &mut vel, &motion, DT);
            if outcome.jumped {
                motion.jumping = true;
            }
            if track_ground(&mut motion, outcome.sample).is_some() {
                landings += 1;
            }
        }

        assert_eq!(landings, 1);
        assert!(motion.grounded);
        assert!(!motion.jumping);
    }

    #[test]
    fn test_platform_height_lookup() {
        let world = WorldGeometry::demo_arena();
        assert_eq!(world.ground_height(0.0, 0.0), 0.0);
        assert_eq!(world.ground_height(7.0, 0.0), 1.5);
        assert_eq!(world.ground_height(-10.0, 0.0), 8.0);
        // Just off the slab edge.
        assert_eq!(world.ground_height(-5.9, 0.0), 0.0);
    }

    #[test]
    fn test_walking_off_ledge_starts_fall() {
        let world = WorldGeometry::demo_arena();
        // Standing on the high ledge, walking toward its +X edge.
        let y = world.ground_height(-10.0, 0.0) + ground_clearance_center();
        let mut pos = PlayerPosition(Vec3::new(-10.0, y, 0.0));
        let mut rot = PlayerRotation(0.0);
        let mut vel = PlayerVelocity(Vec3::ZERO);
        let mut motion = CharacterMotionState::default();

        let mut input = idle_input();
        input.right = true;
        input.sprint = true;

        let mut left_ground = false;
        for _ in 0..180 {
            let outcome =
                step_character(&input, &world, &mut pos, &mut rot, &mut vel, &motion, DT);
            track_ground(&mut motion, outcome.sample);
            if !motion.grounded {
                left_ground = true;
                break;
            }
        }
        assert!(left_ground);
        assert!(motion.falling);
        // The fall start was recorded up at ledge height.
        assert!(motion.fall_start_height > 7.0);
    }
}
