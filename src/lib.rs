//! Kickback -- 2D pinball-style game core built on rapier2d.
//!
//! The crate's job is the glue between a lightweight game-facing entity layer
//! (pixels, degrees, draw order) and a rapier2d simulation that owns the
//! authoritative positions and velocities (meters, radians). The hard parts
//! live in three places:
//!
//! 1. [`sim::Simulation`] owns the rapier world, steps it, and collects every
//!    contact phase (begin / persist / post-solve / end) into a
//!    [`sim::ContactBatch`].
//! 2. [`binding::BodyBinding`] ties exactly one rigid body to exactly one
//!    entity, converting all reads and writes between display and simulation
//!    units, and registers the body's back-reference so contacts can be
//!    routed back to their owner.
//! 3. [`stage::Stage`] owns the entity table and fans each contact event out
//!    to both owning entities, symmetrically, exactly once per phase.
//!
//! # Quick Start
//!
//! ```
//! use kickback::prelude::*;
//!
//! let mut game = Game::new(
//!     GameConfig::default(),
//!     kickback::game::demo_assets(),
//!     Box::new(NullAudio),
//! )
//! .expect("table assembly");
//!
//! // One 60 Hz frame: step physics, dispatch contacts, pull transforms.
//! game.update(&FrameTime::from_delta(1.0 / 60.0));
//! ```

#![deny(unsafe_code)]

pub mod assets;
pub mod audio;
pub mod binding;
pub mod entity;
pub mod game;
pub mod render;
pub mod sim;
pub mod stage;
pub mod table;
pub mod ticker;
pub mod transform;
pub mod units;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the game core.
///
/// Precondition violations (binding a body twice, non-finite configuration)
/// are asserted fatally instead, since a corrupted binding invalidates every
/// subsequent frame.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An image asset was requested that the catalog does not hold.
    #[error("image asset '{name}' is not in the catalog")]
    MissingImage { name: String },

    /// A sound asset was requested that the catalog does not hold.
    #[error("sound asset '{name}' is not in the catalog")]
    MissingSound { name: String },

    /// A polygon shape could not be built from the given vertices.
    #[error("{vertex_count} vertices do not form a usable convex polygon")]
    DegenerateShape { vertex_count: usize },

    /// A rigid body handle does not refer to a live body in the simulation.
    #[error("rigid body handle does not refer to a live body")]
    StaleBody,
}

/// Convenience alias for results carrying an [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::assets::{AssetCatalog, ImageHandle, SoundHandle};
    pub use crate::audio::{AudioBackend, AudioCall, NullAudio, RecordingAudio, SoundMixer};
    pub use crate::binding::BodyBinding;
    pub use crate::entity::{ContactHit, Decal, Entity};
    pub use crate::game::{Game, GameConfig};
    pub use crate::render::{Bitmap, Canvas, CanvasOp, RecordingCanvas};
    pub use crate::sim::{ContactBatch, ContactEventData, SimConfig, Simulation};
    pub use crate::stage::{EntityKey, Stage};
    pub use crate::table::{rebound, Ball, BallTuning, Bumper, Material, Rebound, Wall};
    pub use crate::ticker::{Dispatcher, FrameClock, FrameTime, Participant};
    pub use crate::transform::Transform;
    pub use crate::{EngineError, EngineResult};
}
