//! The entity side of the body-entity pair.
//!
//! A [`BodyBinding`] wraps exactly one rapier body and translates every read
//! and write through the unit conversion layer, so game code above it only
//! ever sees pixels and degrees. Reads are a one-way pull (physics ->
//! visual) done once per update; writes are pushes that take effect on the
//! next world step and are not reflected in the transform until the
//! following pull.
//!
//! Binding also registers the body's back-reference: the owning entity's
//! key goes into the body's user data, exactly once, and is how collision
//! dispatch recovers "who owns this shape".

use rapier2d::math::{Real, Rotation, Vector};
use rapier2d::prelude::{vector, RigidBodyHandle};

use crate::sim::Simulation;
use crate::stage::EntityKey;
use crate::transform::Transform;
use crate::units;
use crate::{EngineError, EngineResult};

/// Exclusive 1:1 binding between an entity and a rigid body.
///
/// Caches the body's linear and angular velocity in display units so
/// accessors are cheap between steps; the caches are refreshed by
/// [`pull`](Self::pull).
#[derive(Debug)]
pub struct BodyBinding {
    body: RigidBodyHandle,
    linear_velocity: Vector<Real>,
    angular_velocity: Real,
}

impl BodyBinding {
    /// Bind `body` to the entity identified by `owner`.
    ///
    /// Stores the back-reference on the body and immediately pulls position,
    /// rotation, and velocity into `transform` and the caches, so the entity
    /// is self-consistent before its first update.
    ///
    /// # Panics
    ///
    /// Panics if the body already carries a back-reference. A body belongs
    /// to at most one entity for its entire lifetime; rebinding would leave
    /// dispatch routing contacts to the wrong owner.
    pub fn new(
        sim: &mut Simulation,
        body: RigidBodyHandle,
        owner: EntityKey,
        transform: &mut Transform,
    ) -> EngineResult<Self> {
        let rb = sim.body_mut(body).ok_or(EngineError::StaleBody)?;
        assert_eq!(
            rb.user_data, 0,
            "body is already bound to an entity; a body has exactly one owner"
        );
        rb.user_data = owner.to_user_data();

        let mut binding = Self {
            body,
            linear_velocity: vector![0.0, 0.0],
            angular_velocity: 0.0,
        };
        binding.pull(sim, transform);
        Ok(binding)
    }

    /// The wrapped body handle.
    pub fn handle(&self) -> RigidBodyHandle {
        self.body
    }

    // -- pull (physics -> visual) -------------------------------------------

    /// Overwrite `transform` and the velocity caches from the body's current
    /// state, converted to display units.
    ///
    /// Called unconditionally once per update; the transform of a bound
    /// entity is never the source of truth between steps.
    pub fn pull(&mut self, sim: &Simulation, transform: &mut Transform) {
        if let Some(rb) = sim.body(self.body) {
            transform.position = units::to_display_vec(*rb.translation());
            transform.rotation = rb.rotation().angle();
            self.linear_velocity = units::to_display_vec(*rb.linvel());
            self.angular_velocity = units::to_display(rb.angvel());
        }
    }

    /// Cached linear velocity in display units (pixels per second).
    pub fn linear_velocity(&self) -> Vector<Real> {
        self.linear_velocity
    }

    /// Cached angular velocity in display units.
    pub fn angular_velocity(&self) -> Real {
        self.angular_velocity
    }

    /// The body's center of mass in display units.
    ///
    /// Distinct from the transform position when the shape's centroid is
    /// offset; always read from the body's authoritative center rather than
    /// derived from cached values.
    pub fn world_center(&self, sim: &Simulation) -> Vector<Real> {
        sim.body(self.body)
            .map(|rb| units::to_display_vec(rb.center_of_mass().coords))
            .unwrap_or_else(|| vector![0.0, 0.0])
    }

    // -- push (visual -> physics), effective on the next step ----------------

    /// Teleport the body to a display-space position.
    pub fn set_position(&self, sim: &mut Simulation, position: Vector<Real>) {
        if let Some(rb) = sim.body_mut(self.body) {
            rb.set_translation(units::to_sim_vec(position), true);
        }
    }

    /// Set the body's rotation in radians.
    pub fn set_rotation(&self, sim: &mut Simulation, radians: Real) {
        if let Some(rb) = sim.body_mut(self.body) {
            rb.set_rotation(Rotation::new(radians), true);
        }
    }

    /// Set the body's linear velocity from display units.
    pub fn set_linear_velocity(&mut self, sim: &mut Simulation, velocity: Vector<Real>) {
        self.linear_velocity = velocity;
        if let Some(rb) = sim.body_mut(self.body) {
            rb.set_linvel(units::to_sim_vec(velocity), true);
        }
    }

    /// Set the body's angular velocity from display units.
    pub fn set_angular_velocity(&mut self, sim: &mut Simulation, velocity: Real) {
        self.angular_velocity = velocity;
        if let Some(rb) = sim.body_mut(self.body) {
            rb.set_angvel(units::to_sim(velocity), true);
        }
    }

    /// Apply a continuous force (display units) at a display-space point.
    /// Cleared after the next step.
    pub fn apply_force(&self, sim: &mut Simulation, force: Vector<Real>, point: Vector<Real>) {
        if let Some(rb) = sim.body_mut(self.body) {
            rb.add_force_at_point(
                units::to_sim_vec(force),
                units::to_sim_point(point.into()),
                true,
            );
        }
    }

    /// Apply an instantaneous impulse (display units) at a display-space point.
    pub fn apply_impulse(&self, sim: &mut Simulation, impulse: Vector<Real>, point: Vector<Real>) {
        if let Some(rb) = sim.body_mut(self.body) {
            rb.apply_impulse_at_point(
                units::to_sim_vec(impulse),
                units::to_sim_point(point.into()),
                true,
            );
        }
    }

    /// Apply a torque (display units). Cleared after the next step.
    pub fn apply_torque(&self, sim: &mut Simulation, torque: Real) {
        if let Some(rb) = sim.body_mut(self.body) {
            rb.add_torque(units::to_sim(torque), true);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimConfig;

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default())
    }

    fn key() -> EntityKey {
        EntityKey::new(0, 0)
    }

    #[test]
    fn construction_pulls_initial_state() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![100.0, 480.0], 45.0, 0.3, false);
        let mut transform = Transform::new();

        let binding = BodyBinding::new(&mut sim, body, key(), &mut transform).unwrap();

        assert!((transform.position.x - 100.0).abs() < 1e-3);
        assert!((transform.position.y - 480.0).abs() < 1e-3);
        assert!((transform.rotation_degrees() - 45.0).abs() < 1e-3);
        assert_eq!(binding.linear_velocity(), vector![0.0, 0.0]);
    }

    #[test]
    fn binding_registers_owner_back_reference() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![0.0, 0.0], 0.0, 0.3, false);
        let owner = EntityKey::new(7, 3);
        let mut transform = Transform::new();
        let _binding = BodyBinding::new(&mut sim, body, owner, &mut transform).unwrap();

        assert_eq!(sim.owner_of(body), Some(owner));
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn double_binding_is_fatal() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![0.0, 0.0], 0.0, 0.3, false);
        let mut t1 = Transform::new();
        let mut t2 = Transform::new();
        let _first = BodyBinding::new(&mut sim, body, EntityKey::new(0, 0), &mut t1).unwrap();
        let _second = BodyBinding::new(&mut sim, body, EntityKey::new(1, 0), &mut t2);
    }

    #[test]
    fn binding_a_stale_handle_is_an_error() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![0.0, 0.0], 0.0, 0.3, false);
        sim.remove_body(body);
        let mut transform = Transform::new();
        let err = BodyBinding::new(&mut sim, body, key(), &mut transform).unwrap_err();
        assert!(matches!(err, EngineError::StaleBody));
    }

    #[test]
    fn push_is_not_visible_until_pull() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![0.0, 0.0], 0.0, 0.3, false);
        let mut transform = Transform::new();
        let binding = BodyBinding::new(&mut sim, body, key(), &mut transform).unwrap();

        binding.set_position(&mut sim, vector![300.0, 90.0]);

        // Transform still holds the pre-push value.
        assert_eq!(transform.position, vector![0.0, 0.0]);

        let mut binding = binding;
        binding.pull(&sim, &mut transform);
        assert!((transform.position.x - 300.0).abs() < 1e-3);
        assert!((transform.position.y - 90.0).abs() < 1e-3);
    }

    #[test]
    fn velocity_round_trips_through_display_units() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![0.0, 0.0], 0.0, 0.3, false);
        let mut transform = Transform::new();
        let mut binding = BodyBinding::new(&mut sim, body, key(), &mut transform).unwrap();

        binding.set_linear_velocity(&mut sim, vector![120.0, -60.0]);
        binding.set_angular_velocity(&mut sim, 90.0);

        // The body holds simulation units.
        let rb = sim.body(body).unwrap();
        assert!((rb.linvel().x - 4.0).abs() < 1e-4);
        assert!((rb.linvel().y + 2.0).abs() < 1e-4);
        assert!((rb.angvel() - 3.0).abs() < 1e-4);

        binding.pull(&sim, &mut transform);
        assert!((binding.linear_velocity().x - 120.0).abs() < 1e-3);
        assert!((binding.linear_velocity().y + 60.0).abs() < 1e-3);
        assert!((binding.angular_velocity() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn impulse_changes_velocity_on_next_step() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![400.0, 240.0], 0.0, 0.3, false);
        let mut transform = Transform::new();
        let mut binding = BodyBinding::new(&mut sim, body, key(), &mut transform).unwrap();

        binding.apply_impulse(&mut sim, vector![0.0, -300.0], transform.position);
        sim.step(1.0 / 60.0);
        binding.pull(&sim, &mut transform);

        assert!(
            binding.linear_velocity().y < 0.0,
            "impulse should push the body upward, got {:?}",
            binding.linear_velocity()
        );
    }

    #[test]
    fn world_center_matches_position_for_centered_shape() {
        let mut sim = sim();
        let body = sim.create_circle(20.0, vector![150.0, 75.0], 0.0, 0.3, false);
        let mut transform = Transform::new();
        let binding = BodyBinding::new(&mut sim, body, key(), &mut transform).unwrap();

        let center = binding.world_center(&sim);
        assert!((center.x - 150.0).abs() < 1e-2);
        assert!((center.y - 75.0).abs() < 1e-2);
    }
}
