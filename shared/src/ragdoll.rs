//! Physics-mode switch: animated capsule-driven character vs. simulated
//! rag-doll.
//!
//! The switch owns the rig's body handles and guarantees the exclusivity
//! invariant: once the short pose hand-off has elapsed, animator sampling
//! and rigid-body simulation are never both driving the skeleton. The
//! engine-specific side (bevy_rapier3d on the client) only implements
//! [`RagdollBody`] and applies the recorded operations.

use bevy::prelude::*;

use crate::schedule::{ActionToken, DeferredActions};

/// Delay before animator sampling stops after entering rag-doll mode.
/// Lets the last pose blend in before the bodies go fully physical, which
/// avoids a visible snap.
pub const ANIMATOR_STOP_DELAY: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicsMode {
    Animated,
    Ragdoll,
}

/// Per-body contract the rig needs from the external rigid-body solver.
pub trait RagdollBody {
    fn set_kinematic(&mut self, kinematic: bool);
    /// Must be called while the body is still dynamic; a kinematic body
    /// cannot have its velocity assigned.
    fn zero_velocity(&mut self);
    fn enable_collision(&mut self, enabled: bool);
    fn distance_to_point(&self, point: Vec3) -> f32;
}

/// A hit recorded at rag-doll activation, resolved to the nearest body.
/// Deferred extension point: stored and exposed, never applied automatically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitImpulse {
    pub point: Vec3,
    pub direction: Vec3,
    pub body_index: usize,
}

enum RigAction {
    StopAnimator,
}

/// State machine for one character's rag-doll rig.
///
/// Exclusively owned by that character's update path; the only deferred work
/// is the animator-stop hand-off, cancelable on re-entry.
pub struct RagdollRig<B: RagdollBody> {
    mode: PhysicsMode,
    bodies: Vec<B>,
    pending_hit: Option<HitImpulse>,
    animator_stop: Option<ActionToken>,
    actions: DeferredActions<RigAction>,
    animator_active: bool,
    controller_enabled: bool,
}

impl<B: RagdollBody> RagdollRig<B> {
    pub fn new(bodies: Vec<B>) -> Self {
        if bodies.is_empty() {
            warn!("rag-doll rig constructed without bodies; transitions will be no-ops");
        }
        Self {
            mode: PhysicsMode::Animated,
            bodies,
            pending_hit: None,
            animator_stop: None,
            actions: DeferredActions::new(),
            animator_active: true,
            controller_enabled: true,
        }
    }

    pub fn mode(&self) -> PhysicsMode {
        self.mode
    }

    pub fn is_ragdoll(&self) -> bool {
        self.mode == PhysicsMode::Ragdoll
    }

    /// Whether the external sampler should currently drive the skeleton.
    pub fn animator_active(&self) -> bool {
        self.animator_active
    }

    /// Whether the primary capsule collision/motion controller is enabled.
    pub fn controller_enabled(&self) -> bool {
        self.controller_enabled
    }

    pub fn bodies(&self) -> &[B] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [B] {
        &mut self.bodies
    }

    /// The recorded hit waiting for a future impulse pass, if any.
    pub fn pending_hit(&self) -> Option<HitImpulse> {
        self.pending_hit
    }

    /// Switch to the simulated rag-doll representation.
    ///
    /// Calling this while already in rag-doll mode is a silent no-op: the
    /// rig body state is left untouched.
    pub fn enable_ragdoll(&mut self, hit: Option<(Vec3, Vec3)>) {
        if self.mode == PhysicsMode::Ragdoll {
            return;
        }
        self.mode = PhysicsMode::Ragdoll;

        // The capsule controller stops steering immediately; the animator
        // gets a short grace window so the last pose blends in.
        self.controller_enabled = false;
        self.animator_stop = Some(
            self.actions
                .schedule(ANIMATOR_STOP_DELAY, RigAction::StopAnimator),
        );

        for body in &mut self.bodies {
            body.set_kinematic(false);
            body.enable_collision(true);
        }

        if let Some((point, direction)) = hit {
            self.pending_hit = self
                .nearest_body(point)
                .map(|body_index| HitImpulse {
                    point,
                    direction,
                    body_index,
                });
        }
    }

    /// Switch back to the animated representation.
    ///
    /// All body velocities are zeroed strictly before any body is marked
    /// kinematic; a kinematic body cannot have velocity assigned, so the
    /// two passes must not be merged. The primary collider's state is left
    /// to the caller.
    pub fn disable_ragdoll(&mut self) {
        if self.mode == PhysicsMode::Animated {
            return;
        }

        if let Some(token) = self.animator_stop.take() {
            self.actions.cancel(token);
        }

        for body in &mut self.bodies {
            body.zero_velocity();
        }
        for body in &mut self.bodies {
            body.set_kinematic(true);
            body.enable_collision(false);
        }

        self.pending_hit = None;
        self.controller_enabled = true;
        self.animator_active = true;
        self.mode = PhysicsMode::Animated;
    }

    /// Advance the deferred hand-off. Runs once per tick.
    pub fn tick(&mut self, dt: f32) {
        for action in self.actions.tick(dt) {
            match action {
                RigAction::StopAnimator => {
                    self.animator_active = false;
                    self.animator_stop = None;
                }
            }
        }
    }

    /// Index of the body whose center of mass is closest to `point`.
    pub fn nearest_body(&self, point: Vec3) -> Option<usize> {
        self.bodies
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_to_point(point)
                    .total_cmp(&b.distance_to_point(point))
            })
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Op {
        SetKinematic(usize, bool),
        ZeroVelocity(usize),
        EnableCollision(usize, bool),
    }

    struct MockBody {
        index: usize,
        center: Vec3,
        log: Rc<RefCell<Vec<Op>>>,
    }

    impl RagdollBody for MockBody {
        fn set_kinematic(&mut self, kinematic: bool) {
            self.log
                .borrow_mut()
                .push(Op::SetKinematic(self.index, kinematic));
        }

        fn zero_velocity(&mut self) {
            self.log.borrow_mut().push(Op::ZeroVelocity(self.index));
        }

        fn enable_collision(&mut self, enabled: bool) {
            self.log
                .borrow_mut()
                .push(Op::EnableCollision(self.index, enabled));
        }

        fn distance_to_point(&self, point: Vec3) -> f32 {
            self.center.distance(point)
        }
    }

    fn rig_with_bodies(centers: &[Vec3]) -> (RagdollRig<MockBody>, Rc<RefCell<Vec<Op>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let bodies = centers
            .iter()
            .enumerate()
            .map(|(index, &center)| MockBody {
                index,
                center,
                log: Rc::clone(&log),
            })
            .collect();
        (RagdollRig::new(bodies), log)
    }

    #[test]
    fn test_enable_makes_bodies_dynamic_and_collidable() {
        let (mut rig, log) = rig_with_bodies(&[Vec3::ZERO, Vec3::Y]);

        rig.enable_ragdoll(None);

        assert!(rig.is_ragdoll());
        assert!(!rig.controller_enabled());
        let ops = log.borrow();
        assert!(ops.contains(&Op::SetKinematic(0, false)));
        assert!(ops.contains(&Op::SetKinematic(1, false)));
        assert!(ops.contains(&Op::EnableCollision(0, true)));
        assert!(ops.contains(&Op::EnableCollision(1, true)));
    }

    #[test]
    fn test_double_enable_is_a_noop() {
        let (mut rig, log) = rig_with_bodies(&[Vec3::ZERO]);

        rig.enable_ragdoll(None);
        let ops_after_first = log.borrow().len();

        rig.enable_ragdoll(Some((Vec3::X, Vec3::Y)));
        // Second call changes nothing: no ops, no recorded hit.
        assert_eq!(log.borrow().len(), ops_after_first);
        assert!(rig.pending_hit().is_none());
    }

    #[test]
    fn test_disable_zeroes_all_velocities_before_any_kinematic_flip() {
        let (mut rig, log) = rig_with_bodies(&[Vec3::ZERO, Vec3::Y, Vec3::X]);

        rig.enable_ragdoll(None);
        log.borrow_mut().clear();
        rig.disable_ragdoll();

        let ops = log.borrow();
        let last_zero = ops
            .iter()
            .rposition(|op| matches!(op, Op::ZeroVelocity(_)))
            .expect("velocities were zeroed");
        let first_kinematic = ops
            .iter()
            .position(|op| matches!(op, Op::SetKinematic(_, true)))
            .expect("bodies were marked kinematic");
        assert!(last_zero < first_kinematic, "ordering violated: {ops:?}");
    }

    #[test]
    fn test_disable_when_animated_is_a_noop() {
        let (mut rig, log) = rig_with_bodies(&[Vec3::ZERO]);

        rig.disable_ragdoll();
        assert!(log.borrow().is_empty());
        assert!(rig.animator_active());
    }

    #[test]
    fn test_animator_stops_after_handoff_delay() {
        let (mut rig, _log) = rig_with_bodies(&[Vec3::ZERO]);

        rig.enable_ragdoll(None);
        // Within the hand-off window the animator still samples.
        rig.tick(0.02);
        assert!(rig.animator_active());

        rig.tick(0.04);
        assert!(!rig.animator_active());
        // From here on, rag-doll and animator sampling are exclusive.
        assert!(rig.is_ragdoll() && !rig.animator_active());
    }

    #[test]
    fn test_reentry_cancels_pending_animator_stop() {
        let (mut rig, _log) = rig_with_bodies(&[Vec3::ZERO]);

        rig.enable_ragdoll(None);
        rig.disable_ragdoll();
        // The scheduled stop was cancelled; even well past the delay the
        // animator keeps running.
        rig.tick(1.0);
        assert!(rig.animator_active());
        assert!(!rig.is_ragdoll());
    }

    #[test]
    fn test_hit_resolves_to_nearest_body() {
        let (mut rig, _log) =
            rig_with_bodies(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.5, 0.0)]);

        rig.enable_ragdoll(Some((Vec3::new(0.1, 1.4, 0.0), Vec3::NEG_Z)));

        let hit = rig.pending_hit().expect("hit recorded");
        assert_eq!(hit.body_index, 1);
        assert_eq!(hit.direction, Vec3::NEG_Z);
    }

    #[test]
    fn test_disable_clears_pending_hit() {
        let (mut rig, _log) = rig_with_bodies(&[Vec3::ZERO]);

        rig.enable_ragdoll(Some((Vec3::X, Vec3::Y)));
        assert!(rig.pending_hit().is_some());

        rig.disable_ragdoll();
        assert!(rig.pending_hit().is_none());
    }
}
