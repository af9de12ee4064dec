use crate::utils::{event::Event, time::SampleTime, window::GrainWindow};

// -------------------------------------------------------------------------------------------------

/// Fully resolved description of a single future grain.
///
/// Grain events are created by the [`GrainScheduler`](crate::GrainScheduler), consumed exactly
/// once by the [`GrainRenderer`](crate::GrainRenderer), which turns them into a sounding voice
/// or drops them when the voice pool is exhausted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainEvent {
    /// Absolute output sample time at which the grain starts.
    pub start_time: SampleTime,
    /// Normalized read start position in the source buffer (0 = start, 1 = end).
    pub position: f64,
    /// Grain length in output samples. Never less than [`GrainEvent::MIN_DURATION`].
    pub duration: u32,
    /// Source read increment per output sample. Negative rates play the grain backwards.
    pub rate: f64,
    /// Left channel gain, including panning and amplitude variation.
    pub left_gain: f32,
    /// Right channel gain, including panning and amplitude variation.
    pub right_gain: f32,
    /// Window shape and skew.
    pub window: GrainWindow,
    /// Envelope attack time in samples.
    pub attack: u32,
    /// Envelope hold time in samples.
    pub hold: u32,
    /// Envelope decay time in samples.
    pub decay: u32,
}

impl GrainEvent {
    /// Minimum grain length in samples: avoids degenerated envelopes and divisions by zero.
    pub const MIN_DURATION: u32 = 8;

    /// True when the grain reads the source backwards.
    pub fn is_reversed(&self) -> bool {
        self.rate < 0.0
    }
}

impl Event for GrainEvent {
    fn sample_time(&self) -> SampleTime {
        self.start_time
    }
}
