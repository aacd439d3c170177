//! Player-related constants and types

/// Walking speed (units per second). The sprint threshold in the animation
/// feeder is derived from this, so changing it shifts the walk/sprint split.
pub const PLAYER_WALK_SPEED: f32 = 5.0;

/// Sprint speed (units per second)
pub const PLAYER_SPRINT_SPEED: f32 = 8.0;

/// Player height (for capsule)
pub const PLAYER_HEIGHT: f32 = 1.8;

/// Player radius (for capsule)
pub const PLAYER_RADIUS: f32 = 0.3;

/// Mouse sensitivity for look
pub const MOUSE_SENSITIVITY: f32 = 0.003;

/// Spawn position for new players (slightly above ground to prevent clipping)
pub const SPAWN_POSITION: [f32; 3] = [0.0, 2.0, 0.0];
