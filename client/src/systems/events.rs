//! Receipt and application of broadcast character events.
//!
//! Every event is applied through the same shared path regardless of whether
//! this client owns the character, so all participants converge on the same
//! animator trigger sequence. Side effects (audio, feedback, rag-doll and
//! camera switches) are dispatched from here.

use bevy::prelude::*;
use lightyear::prelude::*;

use shared::{
    apply_character_event, is_grounded_at, peer_id_to_u64, AnimationParams, CharacterEvent,
    CharacterEventMessage, CharacterMotionState, LocalPlayer, Player, PlayerPosition,
    WorldGeometry,
};

use crate::audio::{play_one_shot, CharacterSounds};
use crate::camera::{CameraRig, CameraShake, DeathRig};
use crate::effects::{CorpseTrail, VignetteIntensity};
use crate::ragdoll::CharacterRagdoll;
use crate::systems::player::TORSO_PIECE;

/// Drain received character events and apply each to its character's view.
pub fn receive_character_events(
    mut commands: Commands,
    time: Res<Time>,
    world: Res<WorldGeometry>,
    sounds: Option<Res<CharacterSounds>>,
    mut shake: ResMut<CameraShake>,
    mut vignette: ResMut<VignetteIntensity>,
    mut client_query: Query<&mut MessageReceiver<CharacterEventMessage>, With<crate::GameClient>>,
    mut characters: Query<(
        Entity,
        &Player,
        &PlayerPosition,
        Has<LocalPlayer>,
        &mut CharacterMotionState,
        &mut AnimationParams,
        &mut CharacterRagdoll,
    )>,
    mut death_rigs: Query<(&mut DeathRig, &mut CameraRig)>,
) {
    let now = time.elapsed_secs_f64();

    let Ok(mut receiver) = client_query.single_mut() else {
        return;
    };

    for message in receiver.receive() {
        let Some((entity, _, position, is_local, mut motion, mut params, mut ragdoll)) =
            characters
                .iter_mut()
                .find(|(_, player, ..)| peer_id_to_u64(player.client_id) == message.owner)
        else {
            // Replication of the character can lag behind the event stream.
            warn!(
                "dropping {:?} for unknown character {}",
                message.event, message.owner
            );
            continue;
        };

        // Grounded is recomputed against local geometry, never trusted from
        // the wire.
        let grounded_now = is_grounded_at(&world, position.0);
        let effects = apply_character_event(
            &message.event,
            &mut motion,
            &mut params,
            is_local,
            now,
            grounded_now,
        );

        if effects.play_land_sound {
            if let Some(sounds) = &sounds {
                play_one_shot(&mut commands, &sounds.land, 0.8);
            }
        }

        if matches!(message.event, CharacterEvent::Damage { .. }) {
            if let Some(sounds) = &sounds {
                play_one_shot(&mut commands, &sounds.hurt, 0.6);
            }
        }

        // Owner-only: camera shake and vignette scale with the hit.
        if let Some(intensity) = effects.feedback_intensity {
            shake.add_trauma(intensity);
            vignette.flash(intensity);
        }

        if effects.died {
            let (point, direction) = match message.event {
                CharacterEvent::Died { point, direction } => (point, direction),
                _ => (position.0, Vec3::NEG_Y),
            };
            ragdoll.rig.enable_ragdoll(Some((point, direction)));

            if let Some(sounds) = &sounds {
                play_one_shot(&mut commands, &sounds.death, 0.7);
            }

            if let Some(torso) = ragdoll.rig.bodies().get(TORSO_PIECE).map(|p| p.entity) {
                commands.entity(entity).insert(CorpseTrail::new(torso));
                if is_local {
                    if let Ok((mut death, mut rig)) = death_rigs.single_mut() {
                        death.focus = Some(torso);
                        rig.enabled = true;
                    }
                }
            }
        }

        if effects.respawned {
            ragdoll.rig.disable_ragdoll();
            // The trail clears with its component; the animator restores the
            // rest pose on the next frame.
            commands.entity(entity).remove::<CorpseTrail>();
            if is_local {
                if let Ok((mut death, mut rig)) = death_rigs.single_mut() {
                    death.focus = None;
                    rig.enabled = false;
                }
            }
        }
    }
}
