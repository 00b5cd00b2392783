//! Entity capabilities and the contact payload handed to them.
//!
//! Everything on the stage implements [`Entity`]. The trait splits into a
//! small required surface (transform and visibility) and optional
//! capabilities with no-op defaults: per-frame updates, drawing, a physics
//! binding, and the four collision hooks. A purely visual prop like
//! [`Decal`] overrides nothing beyond `draw`; the ball overrides nearly
//! everything.

use rapier2d::math::{Point, Real, Vector};
use rapier2d::prelude::RigidBodyHandle;

use crate::assets::ImageHandle;
use crate::audio::SoundMixer;
use crate::binding::BodyBinding;
use crate::render::{Bitmap, Canvas};
use crate::sim::Simulation;
use crate::table::Material;
use crate::ticker::FrameTime;
use crate::transform::Transform;

// ---------------------------------------------------------------------------
// ContactHit
// ---------------------------------------------------------------------------

/// One side's view of a contact event.
///
/// The same underlying event is delivered to both entities; each receives
/// the *other* body and material, and the normal oriented away from itself.
/// Positions are in simulation units, matching what rapier reports.
#[derive(Debug, Clone)]
pub struct ContactHit {
    /// The body on the other side of the contact.
    pub other_body: RigidBodyHandle,
    /// Material of the other side's entity, [`Material::Inert`] when the
    /// other body has no owning entity.
    pub other_material: Material,
    /// Contact point, when the narrow phase has a manifold for the pair.
    pub point: Option<Point<Real>>,
    /// Contact normal pointing from this entity toward the other.
    pub normal: Option<Vector<Real>>,
    /// Applied impulse magnitude; post-solve only.
    pub impulse: Option<Real>,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One participant on the stage.
///
/// Required: a transform and a visibility flag. Everything else defaults to
/// "does nothing", so implementors opt into exactly the capabilities they
/// need.
pub trait Entity {
    /// Display-space transform.
    fn transform(&self) -> &Transform;

    /// Mutable display-space transform.
    fn transform_mut(&mut self) -> &mut Transform;

    /// Whether [`draw`](Self::draw) should be called for this entity.
    fn is_visible(&self) -> bool;

    /// Show or hide the entity. Hidden entities still update and collide.
    fn set_visible(&mut self, visible: bool);

    /// Per-frame behavior, after physics has stepped and contacts have been
    /// dispatched. Bound entities pull their transform here.
    fn update(&mut self, _time: &FrameTime, _sim: &mut Simulation, _mixer: &mut SoundMixer) {}

    /// Render the entity. Only called while visible.
    fn draw(&mut self, _canvas: &mut dyn Canvas) {}

    /// The physics binding, for entities that have one.
    fn binding(&self) -> Option<&BodyBinding> {
        None
    }

    /// The bound body handle, if any.
    fn body(&self) -> Option<RigidBodyHandle> {
        self.binding().map(|b| b.handle())
    }

    /// What this entity is made of, for the other side's rebound lookup.
    fn material(&self) -> Material {
        Material::Inert
    }

    // -- collision hooks, one per phase -------------------------------------

    /// Two fixtures started touching.
    fn on_collision_start(
        &mut self,
        _hit: &ContactHit,
        _sim: &mut Simulation,
        _mixer: &mut SoundMixer,
    ) {
    }

    /// Two fixtures stopped touching.
    fn on_collision_end(
        &mut self,
        _hit: &ContactHit,
        _sim: &mut Simulation,
        _mixer: &mut SoundMixer,
    ) {
    }

    /// The pair is touching this step (pre-solve in listener terms).
    fn on_collision(
        &mut self,
        _hit: &ContactHit,
        _sim: &mut Simulation,
        _mixer: &mut SoundMixer,
    ) {
    }

    /// The solver resolved the contact; `hit.impulse` carries the magnitude.
    fn on_post_solve(
        &mut self,
        _hit: &ContactHit,
        _sim: &mut Simulation,
        _mixer: &mut SoundMixer,
    ) {
    }
}

// ---------------------------------------------------------------------------
// Decal
// ---------------------------------------------------------------------------

/// A purely visual entity: one bitmap at a transform, no body, no behavior.
///
/// Used for the table background and any other art that takes part in draw
/// order but not in physics.
pub struct Decal {
    transform: Transform,
    visible: bool,
    bitmap: Bitmap,
}

impl Decal {
    pub fn new(image: ImageHandle, x: Real, y: Real) -> Self {
        Self {
            transform: Transform::at(x, y),
            visible: true,
            bitmap: Bitmap::new(image),
        }
    }

    /// The decal's bitmap, e.g. to adjust its anchor or alpha.
    pub fn bitmap_mut(&mut self) -> &mut Bitmap {
        &mut self.bitmap
    }
}

impl Entity for Decal {
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

    fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.bitmap.draw(canvas, &self.transform);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
