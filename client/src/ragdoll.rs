//! Rapier-backed rag-doll bodies.
//!
//! The mode switch itself lives in `shared::ragdoll` and is engine-agnostic;
//! this module adapts it to bevy_rapier3d. Each rig piece records the
//! operations the switch requests, and `flush_ragdoll_ops` applies them to
//! the piece entities. Velocity writes go through the `Velocity` component
//! directly while kinematic/collision flips go through `Commands`, which
//! apply at the next sync point - so "zero velocities strictly before any
//! body turns kinematic" holds across the flush as well.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use shared::{HitImpulse, RagdollBody, RagdollRig};

/// One queued change to a rig piece entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyOp {
    SetKinematic(bool),
    ZeroVelocity,
    SetCollision(bool),
}

/// Handle to one rig piece, owned by the character's [`CharacterRagdoll`].
#[derive(Debug)]
pub struct PieceProxy {
    pub entity: Entity,
    /// World-space center, refreshed each frame for hit resolution.
    pub center: Vec3,
    queued: Vec<BodyOp>,
}

impl PieceProxy {
    pub fn new(entity: Entity, center: Vec3) -> Self {
        Self {
            entity,
            center,
            queued: Vec::new(),
        }
    }
}

impl RagdollBody for PieceProxy {
    fn set_kinematic(&mut self, kinematic: bool) {
        self.queued.push(BodyOp::SetKinematic(kinematic));
    }

    fn zero_velocity(&mut self) {
        self.queued.push(BodyOp::ZeroVelocity);
    }

    fn enable_collision(&mut self, enabled: bool) {
        self.queued.push(BodyOp::SetCollision(enabled));
    }

    fn distance_to_point(&self, point: Vec3) -> f32 {
        self.center.distance(point)
    }
}

/// Per-character rag-doll state, attached to the replicated player entity.
#[derive(Component)]
pub struct CharacterRagdoll {
    pub rig: RagdollRig<PieceProxy>,
}

impl CharacterRagdoll {
    pub fn new(pieces: Vec<PieceProxy>) -> Self {
        Self {
            rig: RagdollRig::new(pieces),
        }
    }

    /// The hit recorded at activation. Stored for a future impulse pass;
    /// nothing applies it yet.
    pub fn pending_hit(&self) -> Option<HitImpulse> {
        self.rig.pending_hit()
    }
}

/// Keep each proxy's world center in sync with its piece entity.
pub fn refresh_ragdoll_centers(
    mut ragdolls: Query<&mut CharacterRagdoll>,
    transforms: Query<&GlobalTransform>,
) {
    for mut ragdoll in ragdolls.iter_mut() {
        for piece in ragdoll.rig.bodies_mut() {
            if let Ok(transform) = transforms.get(piece.entity) {
                piece.center = transform.translation();
            }
        }
    }
}

/// Advance the animator-stop hand-off for every rig.
pub fn tick_ragdoll_rigs(time: Res<Time>, mut ragdolls: Query<&mut CharacterRagdoll>) {
    let dt = time.delta_secs();
    for mut ragdoll in ragdolls.iter_mut() {
        ragdoll.rig.tick(dt);
    }
}

/// Apply the queued piece operations to the rapier components.
pub fn flush_ragdoll_ops(
    mut commands: Commands,
    mut ragdolls: Query<&mut CharacterRagdoll>,
    mut velocities: Query<&mut Velocity>,
) {
    for mut ragdoll in ragdolls.iter_mut() {
        for piece in ragdoll.rig.bodies_mut() {
            for op in piece.queued.drain(..) {
                match op {
                    BodyOp::SetKinematic(true) => {
                        commands
                            .entity(piece.entity)
                            .insert(RigidBody::KinematicPositionBased);
                    }
                    BodyOp::SetKinematic(false) => {
                        commands.entity(piece.entity).insert(RigidBody::Dynamic);
                    }
                    BodyOp::ZeroVelocity => {
                        if let Ok(mut velocity) = velocities.get_mut(piece.entity) {
                            *velocity = Velocity::zero();
                        }
                    }
                    BodyOp::SetCollision(true) => {
                        commands.entity(piece.entity).remove::<ColliderDisabled>();
                    }
                    BodyOp::SetCollision(false) => {
                        commands.entity(piece.entity).insert(ColliderDisabled);
                    }
                }
            }
        }
    }
}
