//! The pinball pieces: ball, walls, bumpers, and the rebound table.
//!
//! Rebound strength and sound are decided by what the ball hit, not by who
//! it is: every entity reports a [`Material`], and [`rebound`] maps the
//! material to an impulse multiplier plus an optional sound. Adding a new
//! bumper kind means adding a material and one table row, with no changes
//! to the ball.

use rapier2d::math::{Real, Vector};
use rapier2d::prelude::vector;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetCatalog, SoundHandle};
use crate::audio::SoundMixer;
use crate::binding::BodyBinding;
use crate::entity::{ContactHit, Entity};
use crate::render::{Bitmap, Canvas};
use crate::sim::Simulation;
use crate::stage::EntityKey;
use crate::ticker::FrameTime;
use crate::transform::Transform;
use crate::units;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Materials and the rebound table
// ---------------------------------------------------------------------------

/// What an entity is made of, from the point of view of whatever hits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    /// No rebound behavior; the default for entities that don't opt in.
    Inert,
    Wall,
    RectangleBumper,
    CircleBumper,
    TriangleBumper,
    Ball,
}

/// Reaction to hitting a material: impulse strength and an optional sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rebound {
    /// Impulse magnitude in display units.
    pub impulse: Real,
    /// Effect name and volume, when the material makes a noise.
    pub sound: Option<(&'static str, Real)>,
}

/// The rebound each material produces. [`Material::Inert`] and
/// [`Material::Ball`] produce none.
pub fn rebound(material: Material) -> Option<Rebound> {
    match material {
        Material::Inert | Material::Ball => None,
        Material::Wall => Some(Rebound {
            impulse: 150.0,
            sound: None,
        }),
        Material::TriangleBumper => Some(Rebound {
            impulse: 200.0,
            sound: Some(("bumper3", 0.75)),
        }),
        Material::CircleBumper => Some(Rebound {
            impulse: 250.0,
            sound: Some(("bumper2", 0.75)),
        }),
        Material::RectangleBumper => Some(Rebound {
            impulse: 300.0,
            sound: Some(("bumper1", 0.75)),
        }),
    }
}

// ---------------------------------------------------------------------------
// Wall
// ---------------------------------------------------------------------------

/// Invisible static slab bounding the playfield.
pub struct Wall {
    transform: Transform,
    binding: BodyBinding,
}

impl Wall {
    /// A static box at `(x, y)` with the given full extents, in pixels, and
    /// rotation in degrees.
    pub fn new(
        sim: &mut Simulation,
        owner: EntityKey,
        x: Real,
        y: Real,
        width: Real,
        height: Real,
        rotation: Real,
    ) -> EngineResult<Self> {
        let body = sim.create_box(vector![x, y], width, height, rotation, 1.0, true);
        let mut transform = Transform::new();
        let binding = BodyBinding::new(sim, body, owner, &mut transform)?;
        Ok(Self { transform, binding })
    }
}

impl Entity for Wall {
    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    fn is_visible(&self) -> bool {
        false // nothing to draw; the background art shows the boundary
    }

    fn set_visible(&mut self, _visible: bool) {}

    fn binding(&self) -> Option<&BodyBinding> {
        Some(&self.binding)
    }

    fn material(&self) -> Material {
        Material::Wall
    }
}

// ---------------------------------------------------------------------------
// Bumper
// ---------------------------------------------------------------------------

/// Static bumper in one of three shapes, distinguished by material.
pub struct Bumper {
    transform: Transform,
    visible: bool,
    material: Material,
    bitmap: Bitmap,
    binding: BodyBinding,
}

impl Bumper {
    /// 200x40 box bumper, the strongest kick on the table.
    pub fn rectangle(
        sim: &mut Simulation,
        catalog: &AssetCatalog,
        owner: EntityKey,
        x: Real,
        y: Real,
        rotation: Real,
    ) -> EngineResult<Self> {
        let body = sim.create_box(vector![x, y], 200.0, 40.0, rotation, 1.0, true);
        Self::finish(sim, catalog, owner, body, "rectangle", 1.0)
    }

    /// Convex quad bumper shaped to the "polygon" sprite.
    pub fn triangle(
        sim: &mut Simulation,
        catalog: &AssetCatalog,
        owner: EntityKey,
        x: Real,
        y: Real,
        rotation: Real,
    ) -> EngineResult<Self> {
        // Local-space outline matching the sprite's silhouette.
        let vertices = [
            vector![-27.0, 61.0],
            vector![-28.0, -65.0],
            vector![-17.0, -69.0],
            vector![60.0, 30.0],
        ];
        let body = sim.create_polygon(vector![x, y], &vertices, rotation, 1.0, true)?;
        Self::finish(sim, catalog, owner, body, "polygon", 1.0)
    }

    /// Round bumper; `scale` shrinks both the body and the sprite together.
    pub fn circle(
        sim: &mut Simulation,
        catalog: &AssetCatalog,
        owner: EntityKey,
        x: Real,
        y: Real,
        scale: Real,
    ) -> EngineResult<Self> {
        let body = sim.create_circle(60.0 * scale, vector![x, y], 0.0, 1.0, true);
        Self::finish(sim, catalog, owner, body, "circle", scale)
    }

    fn finish(
        sim: &mut Simulation,
        catalog: &AssetCatalog,
        owner: EntityKey,
        body: rapier2d::prelude::RigidBodyHandle,
        image: &str,
        scale: Real,
    ) -> EngineResult<Self> {
        let material = match image {
            "rectangle" => Material::RectangleBumper,
            "circle" => Material::CircleBumper,
            _ => Material::TriangleBumper,
        };
        let bitmap = Bitmap::new(catalog.image(image)?);
        let mut transform = Transform::new();
        transform.scale = vector![scale, scale];
        let binding = BodyBinding::new(sim, body, owner, &mut transform)?;
        Ok(Self {
            transform,
            visible: true,
            material,
            bitmap,
            binding,
        })
    }
}

impl Entity for Bumper {
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

    fn update(&mut self, _time: &FrameTime, sim: &mut Simulation, _mixer: &mut SoundMixer) {
        // Preserve the sprite scale across the pull; the body knows nothing
        // about it.
        let scale = self.transform.scale;
        self.binding.pull(sim, &mut self.transform);
        self.transform.scale = scale;
    }

    fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.bitmap.draw(canvas, &self.transform);
    }

    fn binding(&self) -> Option<&BodyBinding> {
        Some(&self.binding)
    }

    fn material(&self) -> Material {
        self.material
    }
}

// ---------------------------------------------------------------------------
// Ball
// ---------------------------------------------------------------------------

/// Speed band the ball is held to, in pixels per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallTuning {
    pub min_speed: Real,
    pub max_speed: Real,
}

impl Default for BallTuning {
    fn default() -> Self {
        Self {
            min_speed: 100.0,
            max_speed: 400.0,
        }
    }
}

/// The pinball. Dynamic, never sleeps, clamps its own speed, and kicks
/// itself off whatever it touches according to the rebound table.
pub struct Ball {
    transform: Transform,
    visible: bool,
    bitmap: Bitmap,
    binding: BodyBinding,
    tuning: BallTuning,
}

impl Ball {
    /// Radius in pixels, density chosen to feel light against the table.
    const RADIUS: Real = 20.0;
    const DENSITY: Real = 0.3;

    pub fn new(
        sim: &mut Simulation,
        catalog: &AssetCatalog,
        owner: EntityKey,
        tuning: BallTuning,
    ) -> EngineResult<Self> {
        let body = sim.create_circle(
            Self::RADIUS,
            vector![100.0, 480.0],
            45.0,
            Self::DENSITY,
            false,
        );
        // A settled ball would stop receiving contacts; it must never sleep.
        sim.disallow_sleep(body);

        let bitmap = Bitmap::new(catalog.image("ball")?);
        let mut transform = Transform::new();
        let binding = BodyBinding::new(sim, body, owner, &mut transform)?;
        Ok(Self {
            transform,
            visible: true,
            bitmap,
            binding,
            tuning,
        })
    }

    /// Teleport the ball, body and transform together.
    pub fn set_position(&mut self, sim: &mut Simulation, x: Real, y: Real) {
        self.binding.set_position(sim, vector![x, y]);
        self.transform.position = vector![x, y];
    }

    /// Apply a launch impulse (display units) at the ball's position.
    pub fn kick(&mut self, sim: &mut Simulation, impulse: Vector<Real>) {
        self.binding
            .apply_impulse(sim, impulse, self.transform.position);
    }

    pub fn speed(&self) -> Real {
        self.binding.linear_velocity().norm()
    }
}

impl Entity for Ball {
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

    fn update(&mut self, _time: &FrameTime, sim: &mut Simulation, _mixer: &mut SoundMixer) {
        self.binding.pull(sim, &mut self.transform);

        // Hold the speed inside the tuning band every frame. Too slow and
        // the game stalls, too fast and CCD is the only thing keeping the
        // ball on the table.
        let velocity = self.binding.linear_velocity();
        let clamped = units::clamp_speed(velocity, self.tuning.min_speed, self.tuning.max_speed);
        if clamped != velocity {
            self.binding.set_linear_velocity(sim, clamped);
        }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.bitmap.draw(canvas, &self.transform);
    }

    fn binding(&self) -> Option<&BodyBinding> {
        Some(&self.binding)
    }

    fn material(&self) -> Material {
        Material::Ball
    }

    fn on_collision(&mut self, hit: &ContactHit, sim: &mut Simulation, mixer: &mut SoundMixer) {
        let Some(rebound) = rebound(hit.other_material) else {
            return;
        };
        let Some(point) = hit.point else {
            return; // no manifold yet, nothing to push away from
        };

        // Push away from the contact point, scaled by the material's kick.
        // The tolerance is in display units: a sub-millipixel offset is
        // conversion round-trip noise, not a direction.
        let contact_px = units::to_display_point(point);
        let direction = self.transform.position - contact_px.coords;
        let length = direction.norm();
        if length <= 1e-3 {
            return;
        }

        if let Some((sound, volume)) = rebound.sound {
            mixer.play_effect(&SoundHandle::effect(sound), volume);
        }
        let impulse = direction * (rebound.impulse / length);
        self.binding
            .apply_impulse(sim, impulse, self.transform.position);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageHandle;
    use crate::audio::{AudioCall, RecordingAudio};
    use crate::sim::SimConfig;
    use rapier2d::math::Point;

    fn catalog() -> AssetCatalog {
        let mut catalog = AssetCatalog::new();
        catalog.insert_image(ImageHandle::new("ball", 40.0, 40.0));
        catalog.insert_image(ImageHandle::new("rectangle", 200.0, 40.0));
        catalog.insert_image(ImageHandle::new("polygon", 88.0, 130.0));
        catalog.insert_image(ImageHandle::new("circle", 120.0, 120.0));
        catalog
    }

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default())
    }

    fn key() -> EntityKey {
        EntityKey::new(0, 0)
    }

    #[test]
    fn rebound_table_matches_tuning() {
        assert_eq!(rebound(Material::Inert), None);
        assert_eq!(rebound(Material::Ball), None);
        assert_eq!(
            rebound(Material::Wall),
            Some(Rebound {
                impulse: 150.0,
                sound: None
            })
        );
        assert_eq!(
            rebound(Material::TriangleBumper).unwrap().sound,
            Some(("bumper3", 0.75))
        );
        assert_eq!(
            rebound(Material::CircleBumper).unwrap().sound,
            Some(("bumper2", 0.75))
        );
        assert_eq!(rebound(Material::RectangleBumper).unwrap().impulse, 300.0);
    }

    #[test]
    fn stronger_bumpers_kick_harder_than_walls() {
        let wall = rebound(Material::Wall).unwrap().impulse;
        let triangle = rebound(Material::TriangleBumper).unwrap().impulse;
        let circle = rebound(Material::CircleBumper).unwrap().impulse;
        let rectangle = rebound(Material::RectangleBumper).unwrap().impulse;
        assert!(wall < triangle && triangle < circle && circle < rectangle);
    }

    #[test]
    fn wall_is_invisible_and_walled() {
        let mut sim = sim();
        let wall = Wall::new(&mut sim, key(), -5.0, 240.0, 10.0, 320.0, 0.0).unwrap();
        assert!(!wall.is_visible());
        assert_eq!(wall.material(), Material::Wall);
        assert!(wall.binding().is_some());
    }

    #[test]
    fn circle_bumper_scales_sprite_with_body() {
        let mut sim = sim();
        let bumper = Bumper::circle(&mut sim, &catalog(), key(), 450.0, 150.0, 0.6).unwrap();
        assert_eq!(bumper.transform().scale, vector![0.6, 0.6]);
        assert_eq!(bumper.material(), Material::CircleBumper);
    }

    #[test]
    fn bumper_update_preserves_scale() {
        let mut sim = sim();
        let mut mixer = SoundMixer::new(Box::new(crate::audio::NullAudio));
        let mut bumper = Bumper::circle(&mut sim, &catalog(), key(), 450.0, 150.0, 0.6).unwrap();
        bumper.update(&FrameTime::from_delta(1.0 / 60.0), &mut sim, &mut mixer);
        assert_eq!(bumper.transform().scale, vector![0.6, 0.6]);
    }

    #[test]
    fn ball_spawns_at_the_plunger() {
        let mut sim = sim();
        let ball = Ball::new(&mut sim, &catalog(), key(), BallTuning::default()).unwrap();
        assert!((ball.transform().position.x - 100.0).abs() < 1e-3);
        assert!((ball.transform().position.y - 480.0).abs() < 1e-3);
        assert!((ball.transform().rotation_degrees() - 45.0).abs() < 1e-3);
    }

    #[test]
    fn slow_ball_is_brought_up_to_minimum_speed() {
        let mut sim = sim();
        let mut mixer = SoundMixer::new(Box::new(crate::audio::NullAudio));
        let mut ball = Ball::new(&mut sim, &catalog(), key(), BallTuning::default()).unwrap();
        ball.binding
            .set_linear_velocity(&mut sim, vector![10.0, 0.0]);

        sim.step(1.0 / 60.0);
        ball.update(&FrameTime::from_delta(1.0 / 60.0), &mut sim, &mut mixer);

        let speed = ball.speed();
        assert!(
            (speed - 100.0).abs() < 1.0,
            "expected clamp to 100 px/s, got {speed}"
        );
    }

    #[test]
    fn fast_ball_is_brought_down_to_maximum_speed() {
        let mut sim = sim();
        let mut mixer = SoundMixer::new(Box::new(crate::audio::NullAudio));
        let mut ball = Ball::new(&mut sim, &catalog(), key(), BallTuning::default()).unwrap();
        ball.binding
            .set_linear_velocity(&mut sim, vector![900.0, 0.0]);

        sim.step(1.0 / 60.0);
        ball.update(&FrameTime::from_delta(1.0 / 60.0), &mut sim, &mut mixer);

        let speed = ball.speed();
        assert!(
            speed <= 400.0 + 1.0,
            "expected clamp to 400 px/s, got {speed}"
        );
    }

    #[test]
    fn rebound_plays_the_material_sound_and_kicks() {
        let mut sim = sim();
        let backend = RecordingAudio::new();
        let calls = backend.calls();
        let mut mixer = SoundMixer::new(Box::new(backend));
        let mut ball = Ball::new(&mut sim, &catalog(), key(), BallTuning::default()).unwrap();
        ball.set_position(&mut sim, 650.0, 400.0);

        // Contact just below the ball: the kick should point up.
        let hit = ContactHit {
            other_body: ball.binding.handle(),
            other_material: Material::CircleBumper,
            point: Some(units::to_sim_point(Point::from(vector![650.0, 420.0]))),
            normal: None,
            impulse: None,
        };
        ball.on_collision(&hit, &mut sim, &mut mixer);

        assert!(matches!(
            calls.borrow().as_slice(),
            [AudioCall::Play { name, .. }] if name == "bumper2"
        ));

        sim.step(1.0 / 60.0);
        let vy = sim.body(ball.binding.handle()).unwrap().linvel().y;
        assert!(vy < 0.0, "kick should point away from the contact, vy={vy}");
    }

    #[test]
    fn inert_contacts_produce_no_rebound() {
        let mut sim = sim();
        let backend = RecordingAudio::new();
        let calls = backend.calls();
        let mut mixer = SoundMixer::new(Box::new(backend));
        let mut ball = Ball::new(&mut sim, &catalog(), key(), BallTuning::default()).unwrap();

        let hit = ContactHit {
            other_body: ball.binding.handle(),
            other_material: Material::Inert,
            point: Some(Point::from(vector![1.0, 1.0])),
            normal: None,
            impulse: None,
        };
        ball.on_collision(&hit, &mut sim, &mut mixer);

        assert!(calls.borrow().is_empty());
        sim.step(1.0 / 60.0);
        // Only the clamp-free raw velocity: no impulse was applied.
        let vel = *sim.body(ball.binding.handle()).unwrap().linvel();
        assert!(vel.norm() < 1e-4, "unexpected kick: {vel:?}");
    }

    #[test]
    fn contact_at_ball_center_is_ignored() {
        let mut sim = sim();
        let mut mixer = SoundMixer::new(Box::new(crate::audio::NullAudio));
        let mut ball = Ball::new(&mut sim, &catalog(), key(), BallTuning::default()).unwrap();

        let center = ball.transform().position;
        let hit = ContactHit {
            other_body: ball.binding.handle(),
            other_material: Material::Wall,
            point: Some(units::to_sim_point(Point::from(center))),
            normal: None,
            impulse: None,
        };
        ball.on_collision(&hit, &mut sim, &mut mixer);

        sim.step(1.0 / 60.0);
        let vel = *sim.body(ball.binding.handle()).unwrap().linvel();
        assert!(vel.norm() < 1e-4, "degenerate contact still kicked: {vel:?}");
    }
}
