//! Sound mixing policy over a pluggable playback backend.
//!
//! [`SoundMixer`] owns the policy decisions — effect/track muting, volume
//! normalization, track deduplication — and forwards the surviving calls to
//! an [`AudioBackend`]. The backend is trivially swappable: [`NullAudio`]
//! for headless runs, [`RecordingAudio`] for tests, a real device in an
//! actual frontend.

use std::cell::RefCell;
use std::rc::Rc;

use rapier2d::math::Real;

use crate::assets::SoundHandle;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Playback sink. Receives only calls that survived mixer policy.
pub trait AudioBackend {
    /// Start playing `name` at `volume` in `[0, 1]`; `looped` tracks repeat
    /// until stopped.
    fn play(&mut self, name: &str, volume: Real, looped: bool);

    /// Stop a playing sound by name. Stopping a sound that is not playing
    /// is a no-op.
    fn stop(&mut self, name: &str);
}

/// Backend that discards everything.
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn play(&mut self, _name: &str, _volume: Real, _looped: bool) {}
    fn stop(&mut self, _name: &str) {}
}

/// One call that reached the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Play {
        name: String,
        volume: Real,
        looped: bool,
    },
    Stop {
        name: String,
    },
}

/// Backend that records every call for assertions. The call log is shared
/// so a test can keep reading it after handing the backend to the mixer.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    calls: Rc<RefCell<Vec<AudioCall>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the call log.
    pub fn calls(&self) -> Rc<RefCell<Vec<AudioCall>>> {
        Rc::clone(&self.calls)
    }
}

impl AudioBackend for RecordingAudio {
    fn play(&mut self, name: &str, volume: Real, looped: bool) {
        self.calls.borrow_mut().push(AudioCall::Play {
            name: name.into(),
            volume,
            looped,
        });
    }

    fn stop(&mut self, name: &str) {
        self.calls.borrow_mut().push(AudioCall::Stop { name: name.into() });
    }
}

// ---------------------------------------------------------------------------
// SoundMixer
// ---------------------------------------------------------------------------

/// Routes effect and track playback through mute and volume policy.
pub struct SoundMixer {
    backend: Box<dyn AudioBackend>,
    effects_muted: bool,
    tracks_muted: bool,
    current_track: Option<String>,
}

impl SoundMixer {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            effects_muted: false,
            tracks_muted: false,
            current_track: None,
        }
    }

    /// Play a one-shot effect.
    ///
    /// Volumes above 1.0 are treated as percentages and divided by 100, so
    /// callers may pass either `0.75` or `75`.
    pub fn play_effect(&mut self, sound: &SoundHandle, volume: Real) {
        if self.effects_muted {
            return;
        }
        let volume = if volume > 1.0 { volume / 100.0 } else { volume };
        self.backend.play(&sound.name, volume, false);
    }

    /// Start a looping track, replacing the previous one.
    ///
    /// Re-requesting the track that is already playing is a no-op, so game
    /// code can call this every time a scene starts without restarting the
    /// music.
    pub fn play_track(&mut self, sound: &SoundHandle, volume: Real) {
        if self.current_track.as_deref() == Some(sound.name.as_str()) {
            return;
        }
        if let Some(previous) = self.current_track.take() {
            self.backend.stop(&previous);
        }
        self.current_track = Some(sound.name.clone());
        if !self.tracks_muted {
            let volume = if volume > 1.0 { volume / 100.0 } else { volume };
            self.backend.play(&sound.name, volume, true);
        }
    }

    /// Mute or unmute one-shot effects. Takes effect on the next play call.
    pub fn mute_effects(&mut self, muted: bool) {
        self.effects_muted = muted;
    }

    /// Mute or unmute tracks. Muting stops the current track immediately;
    /// the track slot stays occupied so unmute-then-replay works.
    pub fn mute_tracks(&mut self, muted: bool) {
        self.tracks_muted = muted;
        if muted {
            if let Some(track) = &self.current_track {
                self.backend.stop(track);
            }
        }
    }

    /// Stop the current track, if any.
    pub fn stop_track(&mut self) {
        if let Some(track) = self.current_track.take() {
            self.backend.stop(&track);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
