//! Server-side game systems
//!
//! Updated for Lightyear 0.25

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
use std::collections::HashMap;

use shared::{
    broadcast_event, peer_id_to_u64, step_character, track_ground, CharacterEvent,
    CharacterEventMessage, CharacterMotionState, ChannelUnavailable, EventBroadcast, EventChannel,
    Health, OutboundEvents, Player, PlayerInput, PlayerPosition, PlayerRotation, PlayerStance,
    PlayerVelocity, WorldGeometry, FIXED_TIMESTEP_HZ, SPAWN_POSITION,
};

use crate::combat::{self, RespawnTimer};

/// Stores the latest input for each connected client.
/// We use PeerId in Lightyear 0.25
#[derive(Resource, Default)]
pub struct ClientInputs {
    pub latest: HashMap<PeerId, PlayerInput>,
}

/// Handle new client connections - setup message channels and spawn the
/// player's character.
/// In Lightyear 0.25, we query for newly added ClientOf + Connected entities
pub fn handle_connections(
    mut commands: Commands,
    time: Res<Time>,
    // Query for client links that just got Connected
    new_clients: Query<(Entity, &RemoteId), Added<Connected>>,
    // Filter to only get client links (not the server itself)
    client_filter: Query<(), With<ClientOf>>,
) {
    for (client_entity, remote_id) in new_clients.iter() {
        // Skip if this isn't a client link
        if client_filter.get(client_entity).is_err() {
            continue;
        }

        let peer_id = remote_id.0;
        info!("Client connected: {:?}", peer_id);

        // IMPORTANT: enable replication + message I/O on this client link.
        //
        // Lightyear 0.25 requires you to add these components to the connection entity
        // (the entity with `ClientOf` + `Connected`). Without them, no replication happens.
        commands.entity(client_entity).insert((
            // Replication out: server -> this client
            ReplicationSender::new(
                shared::protocol::tick_duration(),
                SendUpdatesMode::SinceLastAck,
                false,
            ),
            // Client -> Server
            MessageReceiver::<PlayerInput>::default(),
            // Server -> Client
            MessageSender::<CharacterEventMessage>::default(),
        ));

        // Spawn the character entity, replicated to everyone. The motion
        // state is stamped with the spawn time so the landing thud stays
        // quiet while the character settles onto the ground.
        commands.spawn((
            Player { client_id: peer_id },
            PlayerPosition(Vec3::from_array(SPAWN_POSITION)),
            PlayerRotation(0.0),
            PlayerVelocity(Vec3::ZERO),
            PlayerStance::default(),
            Health::default(),
            CharacterMotionState::spawned_at(time.elapsed_secs_f64()),
            OutboundEvents::default(),
            Replicate::new(ReplicationMode::SingleServer(NetworkTarget::All)),
        ));
    }
}

/// Clean up when a client leaves.
/// This is an observer that triggers when a client gets Disconnected component added
pub fn handle_disconnections(
    trigger: On<Add, Disconnected>,
    mut commands: Commands,
    client_entities: Query<&RemoteId>,
    players: Query<(Entity, &Player)>,
    mut inputs: ResMut<ClientInputs>,
) {
    let client_entity = trigger.entity;

    // Get peer ID from client entity
    let peer_id = if let Ok(remote_id) = client_entities.get(client_entity) {
        remote_id.0
    } else {
        warn!(
            "Disconnect trigger for entity {:?} but no RemoteId found",
            client_entity
        );
        return;
    };

    info!("Client {:?} disconnected: {:?}", client_entity, peer_id);

    for (player_entity, player) in players.iter() {
        if player.client_id == peer_id {
            commands.entity(player_entity).despawn();
        }
    }
    inputs.latest.remove(&peer_id);
}

/// Receive input messages from clients
/// In Lightyear 0.25, we read from MessageReceiver components
pub fn receive_client_input(
    mut inputs: ResMut<ClientInputs>,
    // Query client link entities that have a MessageReceiver for PlayerInput
    mut client_links: Query<(&RemoteId, &mut MessageReceiver<PlayerInput>), With<ClientOf>>,
) {
    for (remote_id, mut receiver) in client_links.iter_mut() {
        // Read all received messages, keep the latest
        for input in receiver.receive() {
            inputs.latest.insert(remote_id.0, input);
        }
    }
}

/// Simulate all characters: one physics step, then the ground tracker, and
/// queue the discrete transitions the step produced. Only this system
/// originates Jump/Land events; landings hard enough to hurt also queue the
/// resulting Damage.
pub fn simulate_characters(
    world: Res<WorldGeometry>,
    inputs: Res<ClientInputs>,
    mut players: Query<(
        &Player,
        &mut Health,
        &mut PlayerPosition,
        &mut PlayerRotation,
        &mut PlayerVelocity,
        &mut PlayerStance,
        &mut CharacterMotionState,
        &mut OutboundEvents,
        Option<&RespawnTimer>,
    )>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;

    for (
        player,
        mut health,
        mut position,
        mut rotation,
        mut velocity,
        mut stance,
        mut motion,
        mut events,
        respawn_timer,
    ) in players.iter_mut()
    {
        // Skip dead players - don't process their input
        if !combat::is_player_alive(&health, respawn_timer) {
            // Dead players just stay where they are (no gravity, no movement)
            velocity.0 = Vec3::ZERO;
            continue;
        }

        let input = inputs
            .latest
            .get(&player.client_id)
            .cloned()
            .unwrap_or_default();

        // Stance only changes on the ground; airborne characters keep the
        // stance they left the ground with.
        if motion.grounded && stance.crouching != input.crouch {
            stance.crouching = input.crouch;
        }

        let outcome = step_character(
            &input,
            &world,
            &mut position,
            &mut rotation,
            &mut velocity,
            &motion,
            dt,
        );

        if outcome.jumped {
            motion.jumping = true;
            events.push(CharacterEvent::Jump);
        }

        if let Some(landing) = track_ground(&mut motion, outcome.sample) {
            events.push(CharacterEvent::Land {
                fall_height: landing.fall_height,
            });

            if let Some(amount) = combat::fall_damage(landing.fall_height) {
                let feet = position.0 - Vec3::Y * shared::ground_clearance_center();
                health.take_damage(amount);
                info!(
                    "Player {:?} took {:.1} fall damage ({:.1}m fall)",
                    player.client_id, amount, landing.fall_height
                );
                events.push(CharacterEvent::Damage {
                    point: feet,
                    amount,
                });
            }
        }
    }
}

/// Adapter from a Lightyear message sender to the broadcaster seam.
struct LinkBroadcast<'a> {
    sender: &'a mut MessageSender<CharacterEventMessage>,
}

impl EventBroadcast for LinkBroadcast<'_> {
    fn broadcast(&mut self, owner: u64, event: &CharacterEvent) -> Result<(), ChannelUnavailable> {
        self.sender.send::<EventChannel>(CharacterEventMessage {
            owner,
            event: event.clone(),
        });
        Ok(())
    }
}

/// Flush each character's outbound event queue to every connected client,
/// the originator's own link included. The channel is ordered-reliable, so
/// each link sees one character's events in push order.
pub fn relay_character_events(
    mut characters: Query<(&Player, &mut OutboundEvents)>,
    mut links: Query<
        (Entity, Option<&mut MessageSender<CharacterEventMessage>>),
        (With<ClientOf>, With<Connected>),
    >,
) {
    for (player, mut outbound) in characters.iter_mut() {
        if outbound.is_empty() {
            continue;
        }

        let owner = peer_id_to_u64(player.client_id);
        let events: Vec<CharacterEvent> = outbound.drain().collect();

        for (link_entity, sender) in links.iter_mut() {
            match sender {
                Some(mut sender) => {
                    let mut link = LinkBroadcast {
                        sender: &mut sender,
                    };
                    for event in &events {
                        broadcast_event(&mut link, owner, event);
                    }
                }
                // A link that never got its sender wired up drops the
                // delivery; replication still corrects the visible state.
                None => warn!(
                    "client link {:?} has no event sender; dropping {} event(s) for {:?}",
                    link_entity,
                    events.len(),
                    player.client_id
                ),
            }
        }
    }
}
