//! Discrete character events and their uniform application.
//!
//! A locally detected transition (jump start, landing, damage, death) is
//! queued as a typed event, relayed to every participant over an
//! ordered-reliable channel, and applied identically on each view —
//! including the originator's own. Continuous parameters stay per-view;
//! only these one-shot transitions go over the wire, which is what keeps
//! every participant's animator trigger sequence converged.

use std::collections::VecDeque;
use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::{AnimationParams, ParamKey};
use crate::motion::CharacterMotionState;

/// Landing audio is suppressed this close to a spawn/respawn, so placing a
/// character on the ground doesn't thud.
pub const LAND_SOUND_RESPAWN_COOLDOWN: f64 = 0.5;

/// Damage feedback (camera shake, vignette) reaches full intensity here.
pub const DAMAGE_FEEDBACK_FULL_AMOUNT: f32 = 50.0;

/// A discrete transition on one character. Ephemeral: created, broadcast,
/// applied, discarded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CharacterEvent {
    Jump,
    Land { fall_height: f32 },
    Damage { point: Vec3, amount: f32 },
    Died { point: Vec3, direction: Vec3 },
    Respawned,
}

/// Typed outbound queue, one per character. Only the authority for that
/// character pushes into it; the relay drains it in FIFO order.
#[derive(Component, Debug, Default)]
pub struct OutboundEvents {
    queue: VecDeque<CharacterEvent>,
}

impl OutboundEvents {
    pub fn push(&mut self, event: CharacterEvent) {
        self.queue.push_back(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = CharacterEvent> + '_ {
        self.queue.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// The broadcast channel refused the send (link down, peer gone).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelUnavailable;

impl fmt::Display for ChannelUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broadcast channel unavailable")
    }
}

/// Transport seam for the broadcaster. Implementations must preserve
/// per-sender FIFO order; no cross-sender ordering is required.
pub trait EventBroadcast {
    fn broadcast(&mut self, owner: u64, event: &CharacterEvent) -> Result<(), ChannelUnavailable>;
}

/// In-process channel used by tests and single-participant runs: delivery
/// order is exactly send order.
#[derive(Default, Debug)]
pub struct LoopbackBroadcast {
    pub delivered: VecDeque<(u64, CharacterEvent)>,
}

impl EventBroadcast for LoopbackBroadcast {
    fn broadcast(&mut self, owner: u64, event: &CharacterEvent) -> Result<(), ChannelUnavailable> {
        self.delivered.push_back((owner, event.clone()));
        Ok(())
    }
}

/// Send `event` to the remote participants, swallowing channel failure.
///
/// Returns false when remote delivery was dropped; the caller still applies
/// the event locally, so a dead channel degrades to visual desync that
/// self-corrects on the next state-changing event. No retry queue.
pub fn broadcast_event<B: EventBroadcast>(
    channel: &mut B,
    owner: u64,
    event: &CharacterEvent,
) -> bool {
    match channel.broadcast(owner, event) {
        Ok(()) => true,
        Err(err) => {
            warn!("dropping remote delivery of {event:?} for {owner}: {err}");
            false
        }
    }
}

/// What the surrounding view should do after applying an event. All of these
/// are fire-and-forget collaborator requests, never consumed back.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EventSideEffects {
    /// Landing thud, unless freshly respawned.
    pub play_land_sound: bool,
    /// Owner-only feedback strength in [0, 1] (camera shake + vignette).
    pub feedback_intensity: Option<f32>,
    /// Switch to rag-doll + death presentation.
    pub died: bool,
    /// Restore animated mode + first-person presentation.
    pub respawned: bool,
}

/// Apply a received event to one view of the character.
///
/// This runs identically for the originator and for observers, so every
/// participant converges on the same trigger sequence. `grounded_now` is the
/// receiving view's own local ground test (grounded is *recomputed* locally
/// on landing rather than trusted from the wire).
pub fn apply_character_event(
    event: &CharacterEvent,
    motion: &mut CharacterMotionState,
    params: &mut AnimationParams,
    is_owner_view: bool,
    now: f64,
    grounded_now: bool,
) -> EventSideEffects {
    let mut effects = EventSideEffects::default();

    match event {
        CharacterEvent::Jump => {
            params.set_trigger(ParamKey::Jump);
            params.set_flag(ParamKey::IsJumping, true);
            motion.jumping = true;
        }
        CharacterEvent::Land { .. } => {
            params.set_trigger(ParamKey::Land);
            params.set_flag(ParamKey::IsJumping, false);
            params.set_flag(ParamKey::IsFalling, false);
            params.set_flag(ParamKey::IsGrounded, grounded_now);
            motion.jumping = false;
            motion.falling = false;
            effects.play_land_sound =
                now - motion.last_spawn_time >= LAND_SOUND_RESPAWN_COOLDOWN;
        }
        CharacterEvent::Damage { amount, .. } => {
            params.set_trigger(ParamKey::Damage);
            if is_owner_view {
                effects.feedback_intensity =
                    Some((amount / DAMAGE_FEEDBACK_FULL_AMOUNT).clamp(0.0, 1.0));
            }
        }
        CharacterEvent::Died { .. } => {
            effects.died = true;
        }
        CharacterEvent::Respawned => {
            motion.last_spawn_time = now;
            params.reset_motion();
            effects.respawned = true;
        }
    }

    effects
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeadChannel;

    impl EventBroadcast for DeadChannel {
        fn broadcast(
            &mut self,
            _owner: u64,
            _event: &CharacterEvent,
        ) -> Result<(), ChannelUnavailable> {
            Err(ChannelUnavailable)
        }
    }

    fn apply(
        event: &CharacterEvent,
        motion: &mut CharacterMotionState,
        params: &mut AnimationParams,
        now: f64,
    ) -> EventSideEffects {
        apply_character_event(event, motion, params, true, now, true)
    }

    #[test]
    fn test_jump_sets_trigger_and_flag_everywhere() {
        let mut motion = CharacterMotionState::default();
        let mut observer_params = AnimationParams::default();
        let mut owner_params = AnimationParams::default();

        apply_character_event(
            &CharacterEvent::Jump,
            &mut motion,
            &mut owner_params,
            true,
            1.0,
            true,
        );
        apply_character_event(
            &CharacterEvent::Jump,
            &mut motion,
            &mut observer_params,
            false,
            1.0,
            true,
        );

        for params in [&owner_params, &observer_params] {
            assert!(params.trigger(ParamKey::Jump));
            assert!(params.flag(ParamKey::IsJumping));
        }
        assert!(motion.jumping);
    }

    #[test]
    fn test_land_sound_suppressed_right_after_respawn() {
        let mut motion = CharacterMotionState::default();
        let mut params = AnimationParams::default();
        motion.last_spawn_time = 10.0;

        // 0.3s after spawn: suppressed.
        let effects = apply(
            &CharacterEvent::Land { fall_height: 1.0 },
            &mut motion,
            &mut params,
            10.3,
        );
        assert!(!effects.play_land_sound);

        // 0.6s after spawn: requested.
        let effects = apply(
            &CharacterEvent::Land { fall_height: 1.0 },
            &mut motion,
            &mut params,
            10.6,
        );
        assert!(effects.play_land_sound);
    }

    #[test]
    fn test_land_recomputes_grounded_from_local_state() {
        let mut motion = CharacterMotionState::default();
        let mut params = AnimationParams::default();

        // Local view says we're not actually grounded (positions diverged):
        // the flag follows local truth, not the wire.
        apply_character_event(
            &CharacterEvent::Land { fall_height: 2.0 },
            &mut motion,
            &mut params,
            false,
            5.0,
            false,
        );
        assert!(!params.flag(ParamKey::IsGrounded));
        assert!(params.trigger(ParamKey::Land));
    }

    #[test]
    fn test_damage_feedback_clamps_at_full() {
        let mut motion = CharacterMotionState::default();
        let mut params = AnimationParams::default();

        let effects = apply(
            &CharacterEvent::Damage {
                point: Vec3::ZERO,
                amount: 100.0,
            },
            &mut motion,
            &mut params,
            1.0,
        );
        assert_eq!(effects.feedback_intensity, Some(1.0));

        let effects = apply(
            &CharacterEvent::Damage {
                point: Vec3::ZERO,
                amount: 25.0,
            },
            &mut motion,
            &mut params,
            1.0,
        );
        assert_eq!(effects.feedback_intensity, Some(0.5));
    }

    #[test]
    fn test_damage_feedback_is_owner_only() {
        let mut motion = CharacterMotionState::default();
        let mut params = AnimationParams::default();

        let effects = apply_character_event(
            &CharacterEvent::Damage {
                point: Vec3::ZERO,
                amount: 100.0,
            },
            &mut motion,
            &mut params,
            false,
            1.0,
            true,
        );
        assert_eq!(effects.feedback_intensity, None);
        // The trigger itself is still applied on every view.
        assert!(params.trigger(ParamKey::Damage));
    }

    #[test]
    fn test_loopback_preserves_send_order() {
        let mut channel = LoopbackBroadcast::default();
        let events = [
            CharacterEvent::Jump,
            CharacterEvent::Land { fall_height: 3.0 },
            CharacterEvent::Jump,
        ];
        for event in &events {
            assert!(broadcast_event(&mut channel, 7, event));
        }

        let delivered: Vec<_> = channel.delivered.iter().map(|(_, e)| e.clone()).collect();
        assert_eq!(delivered, events);
    }

    #[test]
    fn test_dead_channel_is_swallowed() {
        let mut channel = DeadChannel;
        // Dropped remotely, reported as such, no panic; the caller still
        // applies the event locally.
        assert!(!broadcast_event(
            &mut channel,
            7,
            &CharacterEvent::Jump
        ));
    }

    #[test]
    fn test_respawn_stamps_spawn_time() {
        let mut motion = CharacterMotionState::default();
        let mut params = AnimationParams::default();

        let effects = apply(&CharacterEvent::Respawned, &mut motion, &mut params, 42.0);
        assert!(effects.respawned);
        assert_eq!(motion.last_spawn_time, 42.0);
    }
}
