use crate::{
    grain::GrainEvent,
    sample::SourceBuffer,
    utils::{ahd::AhdEnvelope, window::GrainWindow},
};

// -------------------------------------------------------------------------------------------------

/// A single sounding grain in the renderer's voice pool.
///
/// Voices are preallocated and reused: activating a voice copies the grain's parameters, so
/// no allocations happen in the audio thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Voice {
    /// Is this voice currently sounding?
    active: bool,
    /// Samples elapsed since the grain started.
    phase: u32,
    /// Grain length in samples.
    duration: u32,
    /// Source read start position in source frames.
    start_frame: f64,
    /// Source frames to advance per output sample. Negative when reversed.
    rate: f64,
    left_gain: f32,
    right_gain: f32,
    window: GrainWindow,
    envelope: AhdEnvelope,
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice {
    /// Create a new inactive voice.
    pub fn new() -> Self {
        Self {
            active: false,
            phase: 0,
            duration: 0,
            start_frame: 0.0,
            rate: 1.0,
            left_gain: 0.0,
            right_gain: 0.0,
            window: GrainWindow::default(),
            envelope: AhdEnvelope::new(0, 0, 0, 0),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Samples elapsed since activation.
    #[cfg(test)]
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Start playing the given grain, reading from a source with the given frame count.
    pub fn activate(&mut self, event: &GrainEvent, source_frame_count: usize) {
        let duration = event.duration.max(GrainEvent::MIN_DURATION);
        self.active = true;
        self.phase = 0;
        self.duration = duration;
        self.start_frame = event.position.clamp(0.0, 1.0)
            * source_frame_count.saturating_sub(1) as f64;
        self.rate = event.rate;
        self.left_gain = event.left_gain;
        self.right_gain = event.right_gain;
        self.window = event.window;
        self.envelope = AhdEnvelope::new(event.attack, event.hold, event.decay, duration);
    }

    /// Deactivate this voice immediately.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.phase = 0;
    }

    /// Render a single stereo sample frame and advance the voice's phase.
    /// The voice deactivates itself when its phase reaches the grain's duration.
    #[inline]
    pub fn process(&mut self, source: &SourceBuffer) -> (f32, f32) {
        debug_assert!(self.active, "Should only process active voices");

        let phase = self.phase as f64;
        let position = self.start_frame + phase * self.rate;
        let envelope =
            self.window.evaluate(phase / self.duration as f64) * self.envelope.evaluate(phase);

        self.phase += 1;
        if self.phase >= self.duration {
            self.active = false;
        }

        if envelope <= 0.0 {
            return (0.0, 0.0);
        }
        let (left, right) = source.stereo_sample_at(position);
        (
            left * envelope * self.left_gain,
            right * envelope * self.right_gain,
        )
    }
}

// -------------------------------------------------------------------------------------------------
