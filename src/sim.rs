//! rapier2d world ownership, stepping, and contact collection.
//!
//! [`Simulation`] owns the full rapier state set and is the only component
//! that touches it directly; entities reach the world exclusively through
//! their [`BodyBinding`](crate::binding::BodyBinding). Each call to
//! [`Simulation::step`]:
//!
//! 1. Advances rapier by the frame's delta (non-positive deltas are skipped).
//! 2. Drains collision and contact-force events plus the touching pairs of
//!    the narrow phase into a [`ContactBatch`] with one list per phase.
//! 3. Clears accumulated forces and torques so pushes are strictly per-step.
//!
//! Body factories take display units (pixels, degrees) so callers never do
//! the conversion themselves, mirroring the binding layer.

use std::num::NonZeroUsize;

use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::stage::EntityKey;
use crate::units;
use crate::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Fixed simulation parameters, chosen at composition time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Gravity in display units (pixels per second squared).
    pub gravity_px: [Real; 2],
    /// Solver iteration count. Raised above rapier's default so a fast ball
    /// stays stable against thin static walls.
    pub solver_iterations: usize,
    /// Continuous collision detection for dynamic bodies. Prevents the ball
    /// from tunneling through a thin wall within a single step.
    pub ccd: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity_px: [0.0, 0.0],
            solver_iterations: 16,
            ccd: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ContactBatch
// ---------------------------------------------------------------------------

/// One contact event between two bodies, in simulation units.
///
/// `point` and `normal` come from the first contact manifold when one is
/// available; the normal points from `body_a` toward `body_b`. `impulse` is
/// only present for the post-solve phase.
#[derive(Debug, Clone)]
pub struct ContactEventData {
    pub body_a: RigidBodyHandle,
    pub body_b: RigidBodyHandle,
    pub point: Option<Point<Real>>,
    pub normal: Option<Vector<Real>>,
    pub impulse: Option<Real>,
}

/// Every contact event produced by one simulation step, grouped by phase.
///
/// Consumed synchronously by the dispatch layer within the same frame;
/// never persisted.
#[derive(Debug, Clone, Default)]
pub struct ContactBatch {
    /// Fixture pairs that started touching this step.
    pub begin: Vec<ContactEventData>,
    /// Pairs still touching after the step (narrow-phase touching only).
    pub persist: Vec<ContactEventData>,
    /// Resolved contacts with their applied impulse magnitude.
    pub post_solve: Vec<ContactEventData>,
    /// Pairs that stopped touching this step.
    pub end: Vec<ContactEventData>,
}

impl ContactBatch {
    /// Total number of events across all phases.
    pub fn len(&self) -> usize {
        self.begin.len() + self.persist.len() + self.post_solve.len() + self.end.len()
    }

    /// Whether the step produced no events at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Owns the rapier2d world and exposes stepping, body factories, and
/// owner resolution to the rest of the crate.
pub struct Simulation {
    config: SimConfig,
    gravity: Vector<Real>,
    pipeline: PhysicsPipeline,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

impl Simulation {
    /// Create a simulation with the given configuration.
    ///
    /// Gravity is supplied in display units and converted once here.
    ///
    /// # Panics
    ///
    /// Panics if the gravity vector is not finite.
    pub fn new(config: SimConfig) -> Self {
        assert!(
            config.gravity_px[0].is_finite() && config.gravity_px[1].is_finite(),
            "gravity must be finite, got {:?}",
            config.gravity_px
        );

        let mut integration_params = IntegrationParameters::default();
        integration_params.num_solver_iterations =
            NonZeroUsize::new(config.solver_iterations).unwrap_or(NonZeroUsize::MIN);

        let gravity = units::to_sim_vec(vector![config.gravity_px[0], config.gravity_px[1]]);

        Self {
            config,
            gravity,
            pipeline: PhysicsPipeline::new(),
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }

    /// The configuration this simulation was built with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // -- stepping -----------------------------------------------------------

    /// Advance the simulation by `dt` seconds and collect the contact events
    /// of the step.
    ///
    /// A non-positive `dt` (stalled or rewound clock) skips the step entirely
    /// and returns an empty batch. Accumulated forces and torques are cleared
    /// after stepping so pushes from game code are strictly per-step.
    pub fn step(&mut self, dt: Real) -> ContactBatch {
        if dt <= 0.0 {
            tracing::debug!(dt, "skipping physics step for non-positive delta");
            return ContactBatch::default();
        }

        self.integration_params.dt = dt;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None, // query pipeline (unused)
            &(),  // physics hooks
            &event_handler,
        );

        let mut batch = ContactBatch::default();

        while let Ok(event) = collision_recv.try_recv() {
            match event {
                CollisionEvent::Started(c1, c2, _flags) => {
                    if let Some(ev) = self.pair_event(c1, c2, None) {
                        batch.begin.push(ev);
                    }
                }
                CollisionEvent::Stopped(c1, c2, _flags) => {
                    // The colliders may already be gone (body removed mid-
                    // contact); that side of the event simply has no owner.
                    if let (Some(a), Some(b)) = (self.body_of(c1), self.body_of(c2)) {
                        batch.end.push(ContactEventData {
                            body_a: a,
                            body_b: b,
                            point: None,
                            normal: None,
                            impulse: None,
                        });
                    }
                }
            }
        }

        // Persistent contacts: every narrow-phase pair that is actually
        // touching this step. Broad-phase-only pairs are filtered out.
        let touching: Vec<(ColliderHandle, ColliderHandle)> = self
            .narrow_phase
            .contact_pairs()
            .filter(|pair| pair.has_any_active_contact)
            .map(|pair| (pair.collider1, pair.collider2))
            .collect();
        for (c1, c2) in touching {
            if let Some(ev) = self.pair_event(c1, c2, None) {
                batch.persist.push(ev);
            }
        }

        // Post-solve: contact forces of resolved contacts, gated on touching.
        while let Ok(force) = force_recv.try_recv() {
            let still_touching = self
                .narrow_phase
                .contact_pair(force.collider1, force.collider2)
                .map(|pair| pair.has_any_active_contact)
                .unwrap_or(false);
            if !still_touching {
                continue;
            }
            if let Some(ev) =
                self.pair_event(force.collider1, force.collider2, Some(force.total_force_magnitude))
            {
                batch.post_solve.push(ev);
            }
        }

        // Channel delivery order may vary across runs; sort each phase by
        // the body-handle pair so dispatch order is reproducible.
        let sort_key = |ev: &ContactEventData| {
            let a = ev.body_a.into_raw_parts();
            let b = ev.body_b.into_raw_parts();
            (a.min(b), a.max(b))
        };
        batch.begin.sort_by_key(sort_key);
        batch.persist.sort_by_key(sort_key);
        batch.post_solve.sort_by_key(sort_key);
        batch.end.sort_by_key(sort_key);

        // Forces are strictly per-step. Sleeping bodies stay asleep.
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }

        batch
    }

    /// Build one contact event from a collider pair, pulling the contact
    /// point and normal out of the narrow phase when a manifold exists.
    fn pair_event(
        &self,
        c1: ColliderHandle,
        c2: ColliderHandle,
        impulse: Option<Real>,
    ) -> Option<ContactEventData> {
        let body_a = self.body_of(c1)?;
        let body_b = self.body_of(c2)?;

        let mut point = None;
        let mut normal = None;
        if let Some(pair) = self.narrow_phase.contact_pair(c1, c2) {
            if let Some(manifold) = pair.manifolds.first() {
                normal = Some(manifold.data.normal);
                if let Some(contact) = manifold.data.solver_contacts.first() {
                    point = Some(contact.point);
                }
            }
        }

        Some(ContactEventData {
            body_a,
            body_b,
            point,
            normal,
            impulse,
        })
    }

    fn body_of(&self, collider: ColliderHandle) -> Option<RigidBodyHandle> {
        self.colliders.get(collider).and_then(|c| c.parent())
    }

    // -- body factories (display units) -------------------------------------

    /// Create a circular body. `radius` and `position` are in pixels,
    /// `rotation` in degrees.
    pub fn create_circle(
        &mut self,
        radius: Real,
        position: Vector<Real>,
        rotation: Real,
        density: Real,
        is_static: bool,
    ) -> RigidBodyHandle {
        let shape = SharedShape::ball(units::to_sim(radius));
        self.body_from_shape(shape, position, rotation, density, is_static)
    }

    /// Create an axis-aligned box body. `width`/`height` are full extents in
    /// pixels, `rotation` in degrees.
    pub fn create_box(
        &mut self,
        position: Vector<Real>,
        width: Real,
        height: Real,
        rotation: Real,
        density: Real,
        is_static: bool,
    ) -> RigidBodyHandle {
        let shape = SharedShape::cuboid(units::to_sim(width) / 2.0, units::to_sim(height) / 2.0);
        self.body_from_shape(shape, position, rotation, density, is_static)
    }

    /// Create a convex polygon body from vertices in local pixel coordinates.
    ///
    /// Fails if the vertices do not span a usable convex hull.
    pub fn create_polygon(
        &mut self,
        position: Vector<Real>,
        vertices: &[Vector<Real>],
        rotation: Real,
        density: Real,
        is_static: bool,
    ) -> EngineResult<RigidBodyHandle> {
        // convex_hull asserts on fewer than 2 points instead of returning
        // None; a polygon needs at least 3 either way.
        if vertices.len() < 3 {
            return Err(EngineError::DegenerateShape {
                vertex_count: vertices.len(),
            });
        }
        let points: Vec<Point<Real>> = vertices
            .iter()
            .map(|v| Point::from(units::to_sim_vec(*v)))
            .collect();
        let shape = SharedShape::convex_hull(&points).ok_or(EngineError::DegenerateShape {
            vertex_count: vertices.len(),
        })?;
        Ok(self.body_from_shape(shape, position, rotation, density, is_static))
    }

    fn body_from_shape(
        &mut self,
        shape: SharedShape,
        position: Vector<Real>,
        rotation: Real,
        density: Real,
        is_static: bool,
    ) -> RigidBodyHandle {
        let builder = if is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic().ccd_enabled(self.config.ccd)
        };
        let body = builder
            .translation(units::to_sim_vec(position))
            .rotation(units::to_radians(rotation))
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::new(shape)
            .density(density)
            .restitution(0.0)
            .friction(1.0)
            .active_events(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
            .contact_force_event_threshold(0.0)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    /// Remove a body and every collider attached to it.
    ///
    /// Removing a body that is already gone is a no-op.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true, // remove attached colliders
        );
    }

    /// Keep a body permanently awake (e.g. the ball, which must never settle).
    pub fn disallow_sleep(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            *body.activation_mut() = RigidBodyActivation::cannot_sleep();
        }
    }

    // -- body access --------------------------------------------------------

    /// Shared access to a body.
    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Mutable access to a body.
    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    /// Whether the handle refers to a live body.
    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.get(handle).is_some()
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Resolve the entity that owns a body via its user-data back-reference.
    ///
    /// Bodies without a binding (plain scenery) have no owner; that is valid
    /// and yields `None`.
    pub fn owner_of(&self, handle: RigidBodyHandle) -> Option<EntityKey> {
        self.bodies
            .get(handle)
            .and_then(|body| EntityKey::from_user_data(body.user_data))
    }

    // -- debug overlay ------------------------------------------------------

    /// Collider outlines in display units, one closed polyline per collider.
    ///
    /// Purely observational: reads shapes and positions, never mutates
    /// simulation state.
    pub fn debug_outlines(&self) -> Vec<Vec<[Real; 2]>> {
        let mut outlines = Vec::with_capacity(self.colliders.len());
        for (_, collider) in self.colliders.iter() {
            let iso = collider.position();
            let shape = collider.shape();
            let mut points: Vec<Point<Real>> = Vec::new();

            if let Some(ball) = shape.as_ball() {
                const SEGMENTS: usize = 16;
                for i in 0..SEGMENTS {
                    let angle = (i as Real) / (SEGMENTS as Real) * std::f32::consts::TAU;
                    points.push(iso * point![ball.radius * angle.cos(), ball.radius * angle.sin()]);
                }
            } else if let Some(cuboid) = shape.as_cuboid() {
                let h = cuboid.half_extents;
                points.push(iso * point![-h.x, -h.y]);
                points.push(iso * point![h.x, -h.y]);
                points.push(iso * point![h.x, h.y]);
                points.push(iso * point![-h.x, h.y]);
            } else if let Some(polygon) = shape.as_convex_polygon() {
                for p in polygon.points() {
                    points.push(iso * *p);
                }
            }

            if !points.is_empty() {
                outlines.push(
                    points
                        .into_iter()
                        .map(|p| {
                            let px = units::to_display_point(p);
                            [px.x, px.y]
                        })
                        .collect(),
                );
            }
        }
        outlines
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
