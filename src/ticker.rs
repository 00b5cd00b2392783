//! Frame timing and the update loop's driver.
//!
//! The host owns the real clock (vsync callback, timer, test loop) and feeds
//! timestamps in; this module turns them into per-frame deltas and fans the
//! tick out to registered [`Participant`]s. Deltas are computed once per
//! frame by [`FrameClock`] so every participant sees the same numbers.

// Timestamps are f64 seconds so precision survives long sessions; deltas
// are f32 to match the simulation's scalar type.

use rapier2d::math::Real;

/// Timing information for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Timestamp of this frame, in seconds.
    pub now: f64,
    /// Timestamp of the previous frame, in seconds.
    pub previous: f64,
    /// Seconds elapsed since the previous frame.
    pub delta: Real,
}

impl FrameTime {
    /// A frame with the given delta, anchored at time zero. Handy for tests
    /// and fixed-step drivers.
    pub fn from_delta(delta: Real) -> Self {
        Self {
            now: delta as f64,
            previous: 0.0,
            delta,
        }
    }
}

/// Turns a stream of host timestamps into frame deltas.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timestamp and produce the frame it completes.
    ///
    /// The first call only establishes the baseline and yields no frame. A
    /// stalled or rewound clock (delta not strictly positive) also yields no
    /// frame, but still advances the baseline so the stream recovers.
    pub fn frame(&mut self, now: f64) -> Option<FrameTime> {
        let previous = match self.last.replace(now) {
            Some(previous) => previous,
            None => return None,
        };
        let delta = (now - previous) as Real;
        if delta <= 0.0 {
            tracing::debug!(now, previous, "clock did not advance, dropping frame");
            return None;
        }
        Some(FrameTime {
            now,
            previous,
            delta,
        })
    }
}

/// Anything that wants a call once per frame.
pub trait Participant {
    fn update(&mut self, time: &FrameTime);
}

/// Owns the participants and pumps frames into them while running.
///
/// Starts stopped; [`start`](Self::start) arms it. Stopping drops frames but
/// keeps the clock's baseline current, so resuming does not deliver one huge
/// catch-up delta.
pub struct Dispatcher {
    clock: FrameClock,
    participants: Vec<Box<dyn Participant>>,
    running: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            clock: FrameClock::new(),
            participants: Vec::new(),
            running: false,
        }
    }

    /// Add a participant. Delivery order is registration order.
    pub fn register(&mut self, participant: Box<dyn Participant>) {
        self.participants.push(participant);
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed one host timestamp. While running, a completed frame is passed
    /// to every participant; while stopped, the timestamp only keeps the
    /// baseline fresh.
    pub fn pump(&mut self, now: f64) {
        let frame = self.clock.frame(now);
        if !self.running {
            return;
        }
        if let Some(time) = frame {
            for participant in &mut self.participants {
                participant.update(&time);
            }
        }
    }

    /// Access a participant by registration index, for hosts that need to
    /// reach back in (e.g. to draw).
    pub fn participant_mut(&mut self, index: usize) -> Option<&mut (dyn Participant + 'static)> {
        self.participants.get_mut(index).map(|p| p.as_mut())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
