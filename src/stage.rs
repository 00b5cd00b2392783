//! Entity storage and contact fan-out.
//!
//! [`Stage`] owns every entity behind a generational [`EntityKey`], keeps a
//! stable insertion order for updates and draws, and turns each step's
//! [`ContactBatch`](crate::sim::ContactBatch) into paired hook calls: every
//! event is delivered to both owning entities, each seeing the other side.
//!
//! Keys are generational so a despawned slot can be reused without stale
//! handles resurrecting: the generation bumps on despawn, and lookups with
//! an old generation miss. The key also serializes into a rapier body's
//! user data (offset by one so zero keeps meaning "unbound"), which is how
//! the simulation routes a contact back to its owner.

use rapier2d::math::{Real, Vector};
use rapier2d::prelude::RigidBodyHandle;
use std::collections::VecDeque;

use crate::audio::SoundMixer;
use crate::entity::{ContactHit, Entity};
use crate::render::Canvas;
use crate::sim::{ContactBatch, ContactEventData, Simulation};
use crate::table::Material;
use crate::ticker::FrameTime;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// EntityKey
// ---------------------------------------------------------------------------

/// Generational handle to a stage slot.
///
/// Packs a slot index and a generation counter; a key is live only while
/// its generation matches the slot's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(u64);

impl EntityKey {
    pub fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    pub fn index(self) -> u32 {
        self.0 as u32
    }

    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Encode for a rapier body's `user_data` slot.
    ///
    /// Offset by one so the all-zeroes default keeps meaning "no owner";
    /// the key `(index 0, generation 0)` stays representable.
    pub fn to_user_data(self) -> u128 {
        self.0 as u128 + 1
    }

    /// Decode from a rapier body's `user_data` slot.
    pub fn from_user_data(raw: u128) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self((raw - 1) as u64))
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

struct Slot {
    generation: u32,
    entity: Box<dyn Entity>,
}

/// Owns every entity and delivers contact events to them.
#[derive(Default)]
pub struct Stage {
    slots: Vec<Option<Slot>>,
    generations: Vec<u32>,
    free: VecDeque<u32>,
    /// Insertion order; update and draw both walk this.
    order: Vec<EntityKey>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Add an entity built by `build`, which receives the key the entity
    /// will live under. The key is needed *during* construction because a
    /// physics-bound entity writes it into its body as the back-reference.
    ///
    /// If `build` fails the reserved slot is released and the error is
    /// passed through.
    pub fn spawn(
        &mut self,
        build: impl FnOnce(EntityKey) -> EngineResult<Box<dyn Entity>>,
    ) -> EngineResult<EntityKey> {
        let index = match self.free.pop_front() {
            Some(index) => index,
            None => {
                self.slots.push(None);
                self.generations.push(0);
                (self.slots.len() - 1) as u32
            }
        };
        let key = EntityKey::new(index, self.generations[index as usize]);

        match build(key) {
            Ok(entity) => {
                self.slots[index as usize] = Some(Slot {
                    generation: key.generation(),
                    entity,
                });
                self.order.push(key);
                Ok(key)
            }
            Err(err) => {
                self.free.push_front(index);
                Err(err)
            }
        }
    }

    /// Remove an entity, destroying its bound body (if any) with it.
    ///
    /// Returns whether the key was live. The slot's generation bumps so the
    /// key, and the user-data back-reference derived from it, go stale.
    pub fn despawn(&mut self, sim: &mut Simulation, key: EntityKey) -> bool {
        let index = key.index() as usize;
        let Some(slot) = self.slots.get(index).and_then(|s| s.as_ref()) else {
            return false;
        };
        if slot.generation != key.generation() {
            return false;
        }

        if let Some(body) = slot.entity.body() {
            sim.remove_body(body);
        }
        self.slots[index] = None;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push_back(key.index());
        self.order.retain(|k| *k != key);
        true
    }

    /// Shared access to a live entity.
    pub fn get(&self, key: EntityKey) -> Option<&dyn Entity> {
        self.slots
            .get(key.index() as usize)?
            .as_ref()
            .filter(|slot| slot.generation == key.generation())
            .map(|slot| slot.entity.as_ref())
    }

    /// Mutable access to a live entity.
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut (dyn Entity + 'static)> {
        self.slots
            .get_mut(key.index() as usize)?
            .as_mut()
            .filter(|slot| slot.generation == key.generation())
            .map(|slot| slot.entity.as_mut())
    }

    /// Live keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.order.iter().copied()
    }

    // -- frame passes -------------------------------------------------------

    /// Run every entity's update, in insertion order.
    pub fn update_all(&mut self, time: &FrameTime, sim: &mut Simulation, mixer: &mut SoundMixer) {
        for i in 0..self.order.len() {
            let key = self.order[i];
            if let Some(entity) = self.get_mut(key) {
                entity.update(time, sim, mixer);
            }
        }
    }

    /// Draw every visible entity, in insertion order (painter's algorithm).
    pub fn draw_all(&mut self, canvas: &mut dyn Canvas) {
        for i in 0..self.order.len() {
            let key = self.order[i];
            if let Some(entity) = self.get_mut(key) {
                if entity.is_visible() {
                    entity.draw(canvas);
                }
            }
        }
    }

    // -- contact dispatch ---------------------------------------------------

    /// Fan a step's contact events out to their owning entities.
    ///
    /// Phase order is begin, persist, post-solve, end. Each event reaches
    /// both owners exactly once; an event whose body has no live owner (a
    /// plain scenery body, or an entity despawned mid-contact) is skipped
    /// silently for that side.
    pub fn dispatch(&mut self, batch: &ContactBatch, sim: &mut Simulation, mixer: &mut SoundMixer) {
        self.deliver(&batch.begin, sim, mixer, |e, hit, sim, mixer| {
            e.on_collision_start(hit, sim, mixer)
        });
        self.deliver(&batch.persist, sim, mixer, |e, hit, sim, mixer| {
            e.on_collision(hit, sim, mixer)
        });
        self.deliver(&batch.post_solve, sim, mixer, |e, hit, sim, mixer| {
            e.on_post_solve(hit, sim, mixer)
        });
        self.deliver(&batch.end, sim, mixer, |e, hit, sim, mixer| {
            e.on_collision_end(hit, sim, mixer)
        });
    }

    fn deliver(
        &mut self,
        events: &[ContactEventData],
        sim: &mut Simulation,
        mixer: &mut SoundMixer,
        hook: fn(&mut dyn Entity, &ContactHit, &mut Simulation, &mut SoundMixer),
    ) {
        for event in events {
            let owner_a = sim.owner_of(event.body_a);
            let owner_b = sim.owner_of(event.body_b);

            // Materials are read before either side is borrowed mutably.
            let material_a = self.material_of(owner_a);
            let material_b = self.material_of(owner_b);

            self.deliver_side(
                owner_a,
                event,
                event.body_b,
                material_b,
                event.normal,
                sim,
                mixer,
                hook,
            );
            self.deliver_side(
                owner_b,
                event,
                event.body_a,
                material_a,
                event.normal.map(|n| -n),
                sim,
                mixer,
                hook,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn deliver_side(
        &mut self,
        owner: Option<EntityKey>,
        event: &ContactEventData,
        other_body: RigidBodyHandle,
        other_material: Material,
        normal: Option<Vector<Real>>,
        sim: &mut Simulation,
        mixer: &mut SoundMixer,
        hook: fn(&mut dyn Entity, &ContactHit, &mut Simulation, &mut SoundMixer),
    ) {
        let Some(key) = owner else {
            return; // unowned scenery body
        };
        let Some(entity) = self.get_mut(key) else {
            tracing::trace!(?key, "contact owner despawned before dispatch");
            return;
        };
        let hit = ContactHit {
            other_body,
            other_material,
            point: event.point,
            normal,
            impulse: event.impulse,
        };
        hook(entity, &hit, sim, mixer);
    }

    fn material_of(&self, owner: Option<EntityKey>) -> Material {
        owner
            .and_then(|key| self.get(key))
            .map(|entity| entity.material())
            .unwrap_or(Material::Inert)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;

    struct Prop {
        transform: Transform,
        visible: bool,
    }

    impl Prop {
        fn boxed() -> Box<dyn Entity> {
            Box::new(Self {
                transform: Transform::new(),
                visible: true,
            })
        }
    }

    impl Entity for Prop {
        fn transform(&self) -> &Transform {
            &self.transform
        }
        fn transform_mut(&mut self) -> &mut Transform {
            &mut self.transform
        }
        fn is_visible(&self) -> bool {
            self.visible
        }
        fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
        }
    }

    #[test]
    fn key_packs_index_and_generation() {
        let key = EntityKey::new(17, 5);
        assert_eq!(key.index(), 17);
        assert_eq!(key.generation(), 5);
    }

    #[test]
    fn user_data_zero_means_unbound() {
        assert_eq!(EntityKey::from_user_data(0), None);
        let key = EntityKey::new(0, 0);
        assert_ne!(key.to_user_data(), 0);
        assert_eq!(EntityKey::from_user_data(key.to_user_data()), Some(key));
    }

    #[test]
    fn user_data_round_trips() {
        for key in [EntityKey::new(0, 0), EntityKey::new(3, 9), EntityKey::new(u32::MAX, 1)] {
            assert_eq!(EntityKey::from_user_data(key.to_user_data()), Some(key));
        }
    }

    #[test]
    fn spawn_then_get() {
        let mut stage = Stage::new();
        let key = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        assert!(stage.get(key).is_some());
        assert_eq!(stage.len(), 1);
    }

    #[test]
    fn spawn_failure_releases_the_slot() {
        let mut stage = Stage::new();
        let err = stage.spawn(|_| {
            Err(crate::EngineError::MissingImage {
                name: "ball".into(),
            })
        });
        assert!(err.is_err());
        assert!(stage.is_empty());

        // The released slot is reused at the same generation.
        let key = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        assert_eq!(key.index(), 0);
        assert_eq!(key.generation(), 0);
    }

    #[test]
    fn despawn_invalidates_the_key() {
        let mut stage = Stage::new();
        let mut sim = Simulation::new(crate::sim::SimConfig::default());
        let key = stage.spawn(|_| Ok(Prop::boxed())).unwrap();

        assert!(stage.despawn(&mut sim, key));
        assert!(stage.get(key).is_none());
        assert!(!stage.despawn(&mut sim, key), "double despawn is a no-op");
    }

    #[test]
    fn reused_slot_does_not_resurrect_old_key() {
        let mut stage = Stage::new();
        let mut sim = Simulation::new(crate::sim::SimConfig::default());
        let old = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        stage.despawn(&mut sim, old);

        let new = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(stage.get(old).is_none());
        assert!(stage.get(new).is_some());
    }

    #[test]
    fn keys_follow_insertion_order() {
        let mut stage = Stage::new();
        let a = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        let b = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        let c = stage.spawn(|_| Ok(Prop::boxed())).unwrap();
        assert_eq!(stage.keys().collect::<Vec<_>>(), vec![a, b, c]);
    }
}
