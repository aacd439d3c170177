//! Per-tick grounded/airborne edge detection and fall-height bookkeeping.
//!
//! The tracker runs unconditionally every fixed tick and never fails. The
//! server runs it authoritatively (its landing edges become network events);
//! every client also runs it per replicated character so continuous state
//! (grounded/falling) is available locally without waiting on the network.

use bevy::prelude::*;

/// Motion state owned exclusively by the character's own update path.
/// Mutated once per tick by [`track_ground`]; never written from elsewhere.
#[derive(Component, Clone, Debug)]
pub struct CharacterMotionState {
    pub grounded: bool,
    /// Previous tick's grounded value. Only [`track_ground`] writes this.
    pub was_grounded: bool,
    pub falling: bool,
    pub jumping: bool,
    /// Highest vertical position recorded since leaving the ground.
    /// Written only while airborne; reset to 0 exactly on the landing edge.
    pub fall_start_height: f32,
    /// Game time of the last spawn or respawn (seconds). Used to suppress
    /// landing audio right after a respawn places the character on the ground.
    pub last_spawn_time: f64,
}

impl Default for CharacterMotionState {
    fn default() -> Self {
        Self {
            grounded: true,
            was_grounded: true,
            falling: false,
            jumping: false,
            fall_start_height: 0.0,
            last_spawn_time: 0.0,
        }
    }
}

impl CharacterMotionState {
    /// Fresh state stamped with a spawn time (used on spawn and respawn).
    pub fn spawned_at(time: f64) -> Self {
        Self {
            last_spawn_time: time,
            ..Default::default()
        }
    }
}

/// What the character's collision volume reported this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundSample {
    pub grounded: bool,
    pub vertical_velocity: f32,
    pub vertical_position: f32,
}

/// Landing edge, emitted exactly once per false -> true grounded transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landing {
    /// Drop from the recorded airborne peak to the landing height.
    pub fall_height: f32,
}

/// Advance the tracker by one tick.
///
/// - Leaving the ground records the fall start height.
/// - While airborne the recorded height follows the rising peak (so a jump's
///   apex, not its start, is what a later fall is measured from).
/// - The landing edge clears `jumping`/`falling`, resets the fall height to 0
///   and returns a [`Landing`] carrying the total drop.
pub fn track_ground(state: &mut CharacterMotionState, sample: GroundSample) -> Option<Landing> {
    let mut landing = None;

    // Leaving-ground edge: remember where the fall starts.
    if state.was_grounded && !sample.grounded {
        state.fall_start_height = sample.vertical_position;
    }

    // First-tick-already-airborne edge case (spawned in the air).
    if !sample.grounded && state.fall_start_height == 0.0 {
        state.fall_start_height = sample.vertical_position;
    }

    if !sample.grounded {
        state.grounded = false;
        state.falling = true;
        // Still rising: the eventual fall is measured from the apex.
        if sample.vertical_velocity > 0.0 && sample.vertical_position > state.fall_start_height {
            state.fall_start_height = sample.vertical_position;
        }
    } else {
        state.grounded = true;
        if !state.was_grounded {
            // Landing edge: report the drop before clearing the bookkeeping.
            landing = Some(Landing {
                fall_height: (state.fall_start_height - sample.vertical_position).max(0.0),
            });
            state.jumping = false;
        }
        state.falling = false;
        state.fall_start_height = 0.0;
    }

    state.was_grounded = sample.grounded;
    landing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airborne(vel: f32, pos: f32) -> GroundSample {
        GroundSample {
            grounded: false,
            vertical_velocity: vel,
            vertical_position: pos,
        }
    }

    fn on_ground(pos: f32) -> GroundSample {
        GroundSample {
            grounded: true,
            vertical_velocity: 0.0,
            vertical_position: pos,
        }
    }

    #[test]
    fn test_falling_mirrors_last_sample() {
        let mut state = CharacterMotionState::default();

        track_ground(&mut state, airborne(-1.0, 5.0));
        assert!(state.falling);
        assert!(!state.grounded);

        track_ground(&mut state, on_ground(0.0));
        assert!(!state.falling);
        assert!(state.grounded);
    }

    #[test]
    fn test_landing_fires_once_per_edge() {
        let mut state = CharacterMotionState::default();

        assert!(track_ground(&mut state, airborne(-1.0, 3.0)).is_some() == false);
        assert!(track_ground(&mut state, on_ground(0.0)).is_some());
        // Sustained grounded ticks never re-fire.
        assert!(track_ground(&mut state, on_ground(0.0)).is_none());
        assert!(track_ground(&mut state, on_ground(0.0)).is_none());
    }

    #[test]
    fn test_fall_height_tracks_rising_peak_then_freezes() {
        let mut state = CharacterMotionState::default();

        // Airborne at height 10, rising at +5 for 3 ticks.
        track_ground(&mut state, airborne(5.0, 10.0));
        assert_eq!(state.fall_start_height, 10.0);
        track_ground(&mut state, airborne(5.0, 15.0));
        assert_eq!(state.fall_start_height, 15.0);
        track_ground(&mut state, airborne(5.0, 20.0));
        assert_eq!(state.fall_start_height, 20.0);

        // Descending at -5: the recorded peak freezes.
        let mut landing = None;
        for pos in [15.0, 10.0, 5.0, 2.0] {
            landing = track_ground(&mut state, airborne(-5.0, pos));
            assert_eq!(state.fall_start_height, 20.0);
        }
        assert!(landing.is_none());

        // Touch ground on tick 8: single landing with the full drop.
        let landing = track_ground(&mut state, on_ground(0.0));
        assert_eq!(landing, Some(Landing { fall_height: 20.0 }));
        assert!(!state.falling);
        assert!(!state.jumping);
        assert_eq!(state.fall_start_height, 0.0);
    }

    #[test]
    fn test_first_tick_already_airborne_initializes_fall_start() {
        let mut state = CharacterMotionState {
            was_grounded: false,
            grounded: false,
            ..Default::default()
        };

        // No leaving-ground edge ever happened; the fall start still gets set.
        track_ground(&mut state, airborne(-2.0, 8.0));
        assert_eq!(state.fall_start_height, 8.0);
    }

    #[test]
    fn test_landing_clears_jumping() {
        let mut state = CharacterMotionState::default();
        state.jumping = true;

        track_ground(&mut state, airborne(3.0, 1.0));
        assert!(state.jumping);

        track_ground(&mut state, on_ground(0.0));
        assert!(!state.jumping);
    }

    #[test]
    fn test_fall_height_never_negative() {
        let mut state = CharacterMotionState::default();

        // Leave ground and land *higher* than the recorded start (stepped up).
        track_ground(&mut state, airborne(1.0, 1.0));
        let landing = track_ground(&mut state, on_ground(4.0));
        assert_eq!(landing, Some(Landing { fall_height: 0.0 }));
    }
}
