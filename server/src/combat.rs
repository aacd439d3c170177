//! Death, fall damage and respawn handling.

use bevy::prelude::*;
use rand::Rng;

use shared::{
    ground_clearance_center, CharacterEvent, CharacterMotionState, Health, OutboundEvents, Player,
    PlayerPosition, PlayerVelocity, WorldGeometry, FIXED_TIMESTEP_HZ, SPAWN_POSITION,
};

/// How long to wait before respawning (seconds)
pub const RESPAWN_TIME: f32 = 4.0;

/// Falls up to this height are harmless.
pub const SAFE_FALL_HEIGHT: f32 = 3.5;

/// Damage per meter of fall beyond the safe height.
pub const FALL_DAMAGE_PER_METER: f32 = 12.0;

/// Respawns scatter this far around the spawn point.
const RESPAWN_SCATTER: f32 = 2.0;

/// Component added to dead players while waiting to respawn
#[derive(Component)]
pub struct RespawnTimer {
    pub time_remaining: f32,
}

/// Skip input processing for dead players
pub fn is_player_alive(health: &Health, respawn_timer: Option<&RespawnTimer>) -> bool {
    !health.is_dead() && respawn_timer.is_none()
}

/// Damage for a landing after falling `fall_height` meters, if any.
pub fn fall_damage(fall_height: f32) -> Option<f32> {
    if fall_height > SAFE_FALL_HEIGHT {
        Some((fall_height - SAFE_FALL_HEIGHT) * FALL_DAMAGE_PER_METER)
    } else {
        None
    }
}

/// Check for dead players, start their respawn timer and queue the death
/// event. The event carries where the character died and which way it was
/// moving, so client views can aim the rag-doll and the death camera.
pub fn check_player_deaths(
    mut commands: Commands,
    mut players: Query<
        (
            Entity,
            &Player,
            &PlayerPosition,
            &PlayerVelocity,
            &Health,
            &mut OutboundEvents,
        ),
        Without<RespawnTimer>,
    >,
) {
    for (entity, player, position, velocity, health, mut events) in players.iter_mut() {
        if health.is_dead() {
            info!("Player {:?} died! Starting respawn timer", player.client_id);

            commands.entity(entity).insert(RespawnTimer {
                time_remaining: RESPAWN_TIME,
            });

            let direction = velocity.0.try_normalize().unwrap_or(Vec3::NEG_Y);
            events.push(CharacterEvent::Died {
                point: position.0,
                direction,
            });
        }
    }
}

/// Tick respawn timers and respawn players when ready
pub fn tick_respawn_timers(
    mut commands: Commands,
    world: Res<WorldGeometry>,
    time: Res<Time>,
    mut players: Query<(
        Entity,
        &Player,
        &mut Health,
        &mut PlayerPosition,
        &mut PlayerVelocity,
        &mut CharacterMotionState,
        &mut OutboundEvents,
        &mut RespawnTimer,
    )>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    let mut rng = rand::thread_rng();

    for (entity, player, mut health, mut position, mut velocity, mut motion, mut events, mut timer) in
        players.iter_mut()
    {
        timer.time_remaining -= dt;

        if timer.time_remaining <= 0.0 {
            info!("Respawning player {:?}", player.client_id);

            // Reset health
            health.current = health.max;

            // Reset position to a scatter around the spawn point
            let spawn_x = SPAWN_POSITION[0] + rng.gen_range(-RESPAWN_SCATTER..RESPAWN_SCATTER);
            let spawn_z = SPAWN_POSITION[2] + rng.gen_range(-RESPAWN_SCATTER..RESPAWN_SCATTER);
            let ground_y = world.ground_height(spawn_x, spawn_z);
            position.0 = Vec3::new(spawn_x, ground_y + ground_clearance_center(), spawn_z);

            // Reset velocity and motion state; the fresh spawn stamp is what
            // suppresses the settle-landing thud on every view.
            velocity.0 = Vec3::ZERO;
            *motion = CharacterMotionState::spawned_at(time.elapsed_secs_f64());

            events.push(CharacterEvent::Respawned);

            commands.entity(entity).remove::<RespawnTimer>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_falls_are_harmless() {
        assert_eq!(fall_damage(0.0), None);
        assert_eq!(fall_damage(3.5), None);
    }

    #[test]
    fn test_fall_damage_scales_past_safe_height() {
        let dmg = fall_damage(5.5).expect("2m past safe height hurts");
        assert!((dmg - 2.0 * FALL_DAMAGE_PER_METER).abs() < 1e-4);
    }

    #[test]
    fn test_dead_or_respawning_players_are_not_alive() {
        let mut health = Health::default();
        assert!(is_player_alive(&health, None));

        let timer = RespawnTimer {
            time_remaining: 1.0,
        };
        assert!(!is_player_alive(&health, Some(&timer)));

        health.take_damage(health.max);
        assert!(!is_player_alive(&health, None));
    }
}
