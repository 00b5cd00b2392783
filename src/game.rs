//! Table assembly and the per-frame loop.
//!
//! [`Game`] wires the pieces together: it builds the simulation, spawns the
//! full table (walls, background, bumpers, ball), and implements
//! [`Participant`] so a [`Dispatcher`](crate::ticker::Dispatcher) can drive
//! it. Each frame steps physics, dispatches the step's contacts, then runs
//! entity updates, in that order, so entities always see post-contact state.

use anyhow::Context;
use rapier2d::math::Real;
use rapier2d::prelude::vector;

use crate::assets::{AssetCatalog, ImageHandle, SoundHandle};
use crate::audio::{AudioBackend, SoundMixer};
use crate::entity::Decal;
use crate::render::Canvas;
use crate::sim::{SimConfig, Simulation};
use crate::stage::{EntityKey, Stage};
use crate::table::{Ball, BallTuning, Bumper, Wall};
use crate::ticker::{FrameTime, Participant};

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Screen dimensions plus the tunables of the simulation and the ball.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Playfield width in pixels.
    pub screen_width: Real,
    /// Playfield height in pixels.
    pub screen_height: Real,
    pub sim: SimConfig,
    pub ball: BallTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen_width: 800.0,
            screen_height: 480.0,
            sim: SimConfig::default(),
            ball: BallTuning::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// The assembled table and its frame loop.
pub struct Game {
    config: GameConfig,
    sim: Simulation,
    stage: Stage,
    mixer: SoundMixer,
    ball: EntityKey,
    total_game_time: f64,
    debug_overlay: bool,
}

impl Game {
    /// Build the table and start the background track.
    ///
    /// Fails if the catalog is missing an asset the table needs; a missing
    /// sprite is a setup bug, not something to limp past at runtime.
    pub fn new(
        config: GameConfig,
        catalog: AssetCatalog,
        audio: Box<dyn AudioBackend>,
    ) -> anyhow::Result<Self> {
        let mut sim = Simulation::new(config.sim.clone());
        let mut stage = Stage::new();
        let mut mixer = SoundMixer::new(audio);

        let ball = build_table(&config, &mut sim, &mut stage, &catalog)
            .context("assembling the pinball table")?;

        let track = catalog
            .sound("background")
            .context("resolving the background track")?;
        mixer.play_track(&track, 1.0);

        tracing::info!(
            entities = stage.len(),
            bodies = sim.body_count(),
            "table assembled"
        );

        Ok(Self {
            config,
            sim,
            stage,
            mixer,
            ball,
            total_game_time: 0.0,
            debug_overlay: false,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Key of the ball entity.
    pub fn ball(&self) -> EntityKey {
        self.ball
    }

    /// Seconds of simulated time accumulated so far.
    pub fn total_game_time(&self) -> f64 {
        self.total_game_time
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn mixer_mut(&mut self) -> &mut SoundMixer {
        &mut self.mixer
    }

    /// Toggle the collider outline overlay drawn on top of the sprites.
    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.debug_overlay = enabled;
    }

    /// Render the current frame: clear, sprites in insertion order, then the
    /// debug overlay when enabled.
    pub fn draw(&mut self, canvas: &mut dyn Canvas) {
        canvas.clear();
        self.stage.draw_all(canvas);
        if self.debug_overlay {
            for outline in self.sim.debug_outlines() {
                canvas.stroke_polygon(&outline);
            }
        }
    }
}

impl Participant for Game {
    fn update(&mut self, time: &FrameTime) {
        if time.delta <= 0.0 {
            return;
        }
        self.total_game_time += time.delta as f64;

        let batch = self.sim.step(time.delta);
        self.stage.dispatch(&batch, &mut self.sim, &mut self.mixer);
        self.stage.update_all(time, &mut self.sim, &mut self.mixer);
    }
}

/// Spawn the demo table. Spawn order is draw order: boundary walls first,
/// then the background, bumpers, and finally the ball on top.
fn build_table(
    config: &GameConfig,
    sim: &mut Simulation,
    stage: &mut Stage,
    catalog: &AssetCatalog,
) -> anyhow::Result<EntityKey> {
    let w = config.screen_width;
    let h = config.screen_height;

    // Boundary slabs just off-screen, plus four angled corner walls.
    let walls: [(Real, Real, Real, Real, Real); 8] = [
        (-5.0, h / 2.0, 10.0, h / 1.5, 0.0),
        (w + 5.0, h / 2.0, 10.0, h / 1.5, 0.0),
        (w / 2.0, -5.0, w / 2.0, 10.0, 0.0),
        (w / 2.0, h + 5.0, w / 2.0, 10.0, 0.0),
        (120.0, 45.0, 265.0, 10.0, -23.0),
        (120.0, 435.0, 265.0, 10.0, 23.0),
        (680.0, 45.0, 265.0, 10.0, 23.0),
        (680.0, 435.0, 265.0, 10.0, -23.0),
    ];
    for (x, y, width, height, rotation) in walls {
        stage.spawn(|key| {
            Ok(Box::new(Wall::new(sim, key, x, y, width, height, rotation)?))
        })?;
    }

    let background = catalog.image("bg")?;
    stage.spawn(|_| Ok(Box::new(Decal::new(background, w / 2.0, h / 2.0))))?;

    stage.spawn(|key| {
        Ok(Box::new(Bumper::rectangle(sim, catalog, key, 675.0, 100.0, 23.0)?))
    })?;
    stage.spawn(|key| {
        Ok(Box::new(Bumper::triangle(sim, catalog, key, 575.0, 250.0, 25.0)?))
    })?;
    stage.spawn(|key| {
        Ok(Box::new(Bumper::triangle(sim, catalog, key, 200.0, 350.0, 0.0)?))
    })?;
    stage.spawn(|key| {
        Ok(Box::new(Bumper::circle(sim, catalog, key, 240.0, 175.0, 1.0)?))
    })?;
    stage.spawn(|key| {
        Ok(Box::new(Bumper::circle(sim, catalog, key, 400.0, 350.0, 1.0)?))
    })?;
    stage.spawn(|key| {
        Ok(Box::new(Bumper::circle(sim, catalog, key, 450.0, 150.0, 0.6)?))
    })?;

    let tuning = config.ball;
    let ball = stage.spawn(|key| {
        let mut ball = Ball::new(sim, catalog, key, tuning)?;
        ball.set_position(sim, 650.0, 400.0);
        ball.kick(sim, vector![0.0, -300.0]);
        Ok(Box::new(ball))
    })?;

    Ok(ball)
}

/// Catalog with the demo table's assets, sized to the shipped art.
pub fn demo_assets() -> AssetCatalog {
    let mut catalog = AssetCatalog::new();
    catalog.insert_image(ImageHandle::new("bg", 800.0, 480.0));
    catalog.insert_image(ImageHandle::new("ball", 40.0, 40.0));
    catalog.insert_image(ImageHandle::new("rectangle", 200.0, 40.0));
    catalog.insert_image(ImageHandle::new("polygon", 88.0, 130.0));
    catalog.insert_image(ImageHandle::new("circle", 120.0, 120.0));
    catalog.insert_sound(SoundHandle::effect("bumper1"));
    catalog.insert_sound(SoundHandle::effect("bumper2"));
    catalog.insert_sound(SoundHandle::effect("bumper3"));
    catalog.insert_sound(SoundHandle::track("background"));
    catalog
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;

    #[test]
    fn table_assembles_with_demo_assets() {
        let game = Game::new(GameConfig::default(), demo_assets(), Box::new(NullAudio)).unwrap();

        // 8 walls + background + 6 bumpers + ball.
        assert_eq!(game.stage().len(), 16);
        // Everything but the background has a body.
        assert_eq!(game.sim().body_count(), 15);
    }

    #[test]
    fn missing_asset_fails_assembly() {
        let mut catalog = AssetCatalog::new();
        catalog.insert_image(ImageHandle::new("bg", 800.0, 480.0));

        let err = Game::new(GameConfig::default(), catalog, Box::new(NullAudio))
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("assembling"));
    }

    #[test]
    fn ball_starts_kicked_at_the_launch_position() {
        let game = Game::new(GameConfig::default(), demo_assets(), Box::new(NullAudio)).unwrap();
        let ball = game.stage().get(game.ball()).expect("ball is live");
        assert!((ball.transform().position.x - 650.0).abs() < 1e-3);
        assert!((ball.transform().position.y - 400.0).abs() < 1e-3);
    }

    #[test]
    fn update_accumulates_game_time() {
        let mut game =
            Game::new(GameConfig::default(), demo_assets(), Box::new(NullAudio)).unwrap();
        for _ in 0..3 {
            game.update(&FrameTime::from_delta(0.5));
        }
        assert!((game.total_game_time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn zero_delta_update_changes_nothing() {
        let mut game =
            Game::new(GameConfig::default(), demo_assets(), Box::new(NullAudio)).unwrap();
        game.update(&FrameTime::from_delta(1.0 / 60.0));

        let before = game.stage().get(game.ball()).unwrap().transform().clone();
        let time_before = game.total_game_time();

        game.update(&FrameTime {
            now: 1.0,
            previous: 1.0,
            delta: 0.0,
        });

        assert_eq!(
            game.stage().get(game.ball()).unwrap().transform(),
            &before
        );
        assert_eq!(game.total_game_time(), time_before);
    }
}
