//! Animation parameter set and the per-tick feeder that fills it.
//!
//! Parameters are keyed by a compile-time enum rather than strings, so a
//! renamed or missing parameter is a compile error instead of a silent
//! animator no-op. The external sampler (client-side) only reads this
//! structure; one-shot triggers are cleared here by explicit policy, never
//! by the sampler.

use bevy::prelude::*;

use crate::motion::CharacterMotionState;
use crate::player::PLAYER_WALK_SPEED;

/// Critically-damped smoothing time for continuous parameters (seconds).
/// Large enough to hide per-tick velocity noise, small enough to feel direct.
pub const PARAM_SMOOTH_TIME: f32 = 0.1;

/// Yaw deltas at or below this are treated as no turn at all.
pub const LOOK_DEAD_ZONE: f32 = 0.001;

/// Gain applied to the yaw delta before clamping into [-1, 1].
pub const LOOK_GAIN: f32 = 10.0;

/// How long the damage trigger stays latched before the feeder clears it.
pub const DAMAGE_TRIGGER_HOLD: f32 = 0.25;

/// Every animation parameter the sampler can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKey {
    MoveX,
    MoveY,
    LookX,
    IsSprinting,
    IsCrouching,
    IsGrounded,
    IsJumping,
    IsFalling,
    Jump,
    Land,
    Damage,
}

const FLOAT_COUNT: usize = 3;
const BOOL_COUNT: usize = 5;
const TRIGGER_COUNT: usize = 3;

impl ParamKey {
    fn float_index(self) -> Option<usize> {
        match self {
            ParamKey::MoveX => Some(0),
            ParamKey::MoveY => Some(1),
            ParamKey::LookX => Some(2),
            _ => None,
        }
    }

    fn bool_index(self) -> Option<usize> {
        match self {
            ParamKey::IsSprinting => Some(0),
            ParamKey::IsCrouching => Some(1),
            ParamKey::IsGrounded => Some(2),
            ParamKey::IsJumping => Some(3),
            ParamKey::IsFalling => Some(4),
            _ => None,
        }
    }

    fn trigger_index(self) -> Option<usize> {
        match self {
            ParamKey::Jump => Some(0),
            ParamKey::Land => Some(1),
            ParamKey::Damage => Some(2),
            _ => None,
        }
    }
}

/// A float smoothed toward its target with a critically damped spring.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmoothedFloat {
    current: f32,
    velocity: f32,
}

impl SmoothedFloat {
    pub fn get(&self) -> f32 {
        self.current
    }

    pub fn step(&mut self, target: f32, smooth_time: f32, dt: f32) {
        self.current = smooth_damp(self.current, target, &mut self.velocity, smooth_time, dt);
    }

    fn reset(&mut self) {
        self.current = 0.0;
        self.velocity = 0.0;
    }
}

/// Critically damped spring toward `target`; overshoot-free for any `dt`.
/// Standard SmoothDamp formulation with a cubic exponential approximation.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    dt: f32,
) -> f32 {
    let omega = 2.0 / smooth_time.max(1e-4);
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    target + (change + temp) * exp
}

/// One parameter set per character, continuously overwritten by the feeder.
#[derive(Component, Clone, Debug, Default)]
pub struct AnimationParams {
    floats: [SmoothedFloat; FLOAT_COUNT],
    bools: [bool; BOOL_COUNT],
    triggers: [bool; TRIGGER_COUNT],
    /// Counts consecutive settled feeds while the land trigger is latched.
    land_settle_ticks: u8,
    damage_hold: f32,
}

impl AnimationParams {
    pub fn float(&self, key: ParamKey) -> f32 {
        match key.float_index() {
            Some(i) => self.floats[i].get(),
            None => {
                warn!("{key:?} is not a float parameter");
                0.0
            }
        }
    }

    pub fn flag(&self, key: ParamKey) -> bool {
        match key.bool_index() {
            Some(i) => self.bools[i],
            None => {
                warn!("{key:?} is not a boolean parameter");
                false
            }
        }
    }

    pub fn set_flag(&mut self, key: ParamKey, value: bool) {
        if let Some(i) = key.bool_index() {
            self.bools[i] = value;
        } else {
            warn!("{key:?} is not a boolean parameter");
        }
    }

    /// One-shot triggers stay latched until the feeder's clear policy fires.
    pub fn trigger(&self, key: ParamKey) -> bool {
        match key.trigger_index() {
            Some(i) => self.triggers[i],
            None => {
                warn!("{key:?} is not a trigger parameter");
                false
            }
        }
    }

    pub fn set_trigger(&mut self, key: ParamKey) {
        if let Some(i) = key.trigger_index() {
            self.triggers[i] = true;
            if key == ParamKey::Land {
                self.land_settle_ticks = 0;
            }
            if key == ParamKey::Damage {
                self.damage_hold = 0.0;
            }
        } else {
            warn!("{key:?} is not a trigger parameter");
        }
    }

    pub fn clear_trigger(&mut self, key: ParamKey) {
        if let Some(i) = key.trigger_index() {
            self.triggers[i] = false;
        }
    }

    /// Hard reset of the smoothed values (used on respawn so stale lean
    /// doesn't blend into the fresh pose).
    pub fn reset_motion(&mut self) {
        for f in &mut self.floats {
            f.reset();
        }
    }
}

/// Continuous inputs for one feed tick, all sourced locally per view.
#[derive(Clone, Copy, Debug)]
pub struct FeederInput {
    /// World-space velocity; only the horizontal components are used.
    pub world_velocity: Vec3,
    /// Character yaw (radians) for the world-to-local conversion.
    pub yaw: f32,
    /// Yaw change this tick (radians).
    pub yaw_delta: f32,
    pub max_speed: f32,
    pub crouching: bool,
}

/// Fill `params` from the character's continuous motion and tracked state.
///
/// Runs once per tick per view, after the ground tracker. Discrete triggers
/// are *not* set here (they come from broadcast events); this function only
/// applies their clear policy.
pub fn feed_animation_params(
    params: &mut AnimationParams,
    motion: &CharacterMotionState,
    input: &FeederInput,
    dt: f32,
) {
    // --- Continuous locomotion ---
    // World horizontal velocity into the character's local frame.
    // In Bevy: +X right, -Z forward.
    let horiz = Vec2::new(input.world_velocity.x, input.world_velocity.z);
    let forward = Vec2::new(-input.yaw.sin(), -input.yaw.cos());
    let right = Vec2::new(input.yaw.cos(), -input.yaw.sin());

    let max_speed = input.max_speed.max(1e-3);
    let target_x = horiz.dot(right) / max_speed;
    let target_y = horiz.dot(forward) / max_speed;

    params.floats[0].step(target_x, PARAM_SMOOTH_TIME, dt);
    params.floats[1].step(target_y, PARAM_SMOOTH_TIME, dt);

    // --- Look ---
    let look_target = if input.yaw_delta.abs() <= LOOK_DEAD_ZONE {
        0.0
    } else {
        (input.yaw_delta * LOOK_GAIN).clamp(-1.0, 1.0)
    };
    params.floats[2].step(look_target, PARAM_SMOOTH_TIME, dt);

    // --- Flags ---
    // Sprint threshold is speed-squared against (walk + 1)^2. No hysteresis;
    // flicker right at the boundary is an accepted trade-off.
    let sprint_threshold = (PLAYER_WALK_SPEED + 1.0) * (PLAYER_WALK_SPEED + 1.0);
    params.set_flag(ParamKey::IsSprinting, horiz.length_squared() > sprint_threshold);
    params.set_flag(ParamKey::IsCrouching, input.crouching);
    params.set_flag(ParamKey::IsGrounded, motion.grounded);
    params.set_flag(ParamKey::IsJumping, motion.jumping);
    params.set_flag(ParamKey::IsFalling, motion.falling);

    // --- Trigger clear policy ---
    // Jump: cleared once safely grounded-and-not-jumping, or as soon as the
    // character is airborne at all (jump ascent can roll straight into the
    // fall animation without a separate state in between).
    if (motion.grounded && !motion.jumping) || motion.falling {
        params.clear_trigger(ParamKey::Jump);
    }

    // Land: cleared once re-grounding has held for two consecutive feeds,
    // guaranteeing the sampler at least one feed to observe the latch.
    if params.trigger(ParamKey::Land) {
        if motion.grounded && !motion.jumping && !motion.falling {
            params.land_settle_ticks = params.land_settle_ticks.saturating_add(1);
            if params.land_settle_ticks >= 2 {
                params.clear_trigger(ParamKey::Land);
            }
        } else {
            params.land_settle_ticks = 0;
        }
    }

    // Damage: latched for a fixed hold so a one-tick sampler can't miss it.
    if params.trigger(ParamKey::Damage) {
        params.damage_hold += dt;
        if params.damage_hold >= DAMAGE_TRIGGER_HOLD {
            params.clear_trigger(ParamKey::Damage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn grounded_motion() -> CharacterMotionState {
        CharacterMotionState::default()
    }

    fn input_with_velocity(v: Vec3) -> FeederInput {
        FeederInput {
            world_velocity: v,
            yaw: 0.0,
            yaw_delta: 0.0,
            max_speed: 8.0,
            crouching: false,
        }
    }

    #[test]
    fn test_forward_velocity_maps_to_move_y() {
        let mut params = AnimationParams::default();
        let motion = grounded_motion();
        // yaw 0 means forward is -Z in the teacher's convention.
        let input = input_with_velocity(Vec3::new(0.0, 0.0, -8.0));

        // Let the smoothing converge.
        for _ in 0..120 {
            feed_animation_params(&mut params, &motion, &input, DT);
        }

        assert!((params.float(ParamKey::MoveY) - 1.0).abs() < 0.02);
        assert!(params.float(ParamKey::MoveX).abs() < 0.02);
    }

    #[test]
    fn test_local_frame_follows_yaw() {
        let mut params = AnimationParams::default();
        let motion = grounded_motion();
        // Facing +X (yaw = -90 degrees) while moving along +X: pure forward.
        let mut input = input_with_velocity(Vec3::new(8.0, 0.0, 0.0));
        input.yaw = -std::f32::consts::FRAC_PI_2;

        for _ in 0..120 {
            feed_animation_params(&mut params, &motion, &input, DT);
        }

        assert!((params.float(ParamKey::MoveY) - 1.0).abs() < 0.02);
        assert!(params.float(ParamKey::MoveX).abs() < 0.02);
    }

    #[test]
    fn test_sprint_threshold_is_walk_plus_one() {
        let mut params = AnimationParams::default();
        let motion = grounded_motion();

        let walking = input_with_velocity(Vec3::new(0.0, 0.0, -5.9));
        feed_animation_params(&mut params, &motion, &walking, DT);
        assert!(!params.flag(ParamKey::IsSprinting));

        let sprinting = input_with_velocity(Vec3::new(0.0, 0.0, -6.1));
        feed_animation_params(&mut params, &motion, &sprinting, DT);
        assert!(params.flag(ParamKey::IsSprinting));
    }

    #[test]
    fn test_jump_trigger_clears_when_grounded_and_not_jumping() {
        let mut params = AnimationParams::default();
        params.set_trigger(ParamKey::Jump);

        // Grounded but still flagged jumping: trigger must stay latched.
        let mut motion = grounded_motion();
        motion.jumping = true;
        feed_animation_params(&mut params, &motion, &input_with_velocity(Vec3::ZERO), DT);
        assert!(params.trigger(ParamKey::Jump));

        motion.jumping = false;
        feed_animation_params(&mut params, &motion, &input_with_velocity(Vec3::ZERO), DT);
        assert!(!params.trigger(ParamKey::Jump));
    }

    #[test]
    fn test_jump_trigger_clears_when_falling() {
        let mut params = AnimationParams::default();
        params.set_trigger(ParamKey::Jump);

        let mut motion = grounded_motion();
        motion.grounded = false;
        motion.jumping = true;
        motion.falling = true;
        feed_animation_params(&mut params, &motion, &input_with_velocity(Vec3::ZERO), DT);
        assert!(!params.trigger(ParamKey::Jump));
    }

    #[test]
    fn test_look_dead_zone_and_clamp() {
        let mut params = AnimationParams::default();
        let motion = grounded_motion();

        // Inside the dead zone: target is exactly zero.
        let mut input = input_with_velocity(Vec3::ZERO);
        input.yaw_delta = 0.0005;
        for _ in 0..120 {
            feed_animation_params(&mut params, &motion, &input, DT);
        }
        assert!(params.float(ParamKey::LookX).abs() < 1e-3);

        // Large delta: gain saturates at 1.
        input.yaw_delta = 5.0;
        for _ in 0..120 {
            feed_animation_params(&mut params, &motion, &input, DT);
        }
        assert!((params.float(ParamKey::LookX) - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_damage_trigger_clears_after_hold() {
        let mut params = AnimationParams::default();
        let motion = grounded_motion();
        params.set_trigger(ParamKey::Damage);

        let input = input_with_velocity(Vec3::ZERO);

        // Stays latched for several feeds...
        for _ in 0..5 {
            feed_animation_params(&mut params, &motion, &input, DT);
            assert!(params.trigger(ParamKey::Damage));
        }
        // ...and clears once the hold elapses.
        let remaining = (DAMAGE_TRIGGER_HOLD / DT).ceil() as usize;
        for _ in 0..remaining {
            feed_animation_params(&mut params, &motion, &input, DT);
        }
        assert!(!params.trigger(ParamKey::Damage));
    }

    #[test]
    fn test_smooth_damp_is_overshoot_free() {
        let mut velocity = 0.0;
        let mut current = 0.0;
        for _ in 0..240 {
            current = smooth_damp(current, 1.0, &mut velocity, PARAM_SMOOTH_TIME, DT);
            assert!(current <= 1.0 + 1e-4);
        }
        assert!((current - 1.0).abs() < 1e-3);
    }
}
