use crate::{
    grain::GrainEvent,
    parameters::EngineParameters,
    utils::{db_to_linear, random::SeededRng, time::SampleTime},
};

// -------------------------------------------------------------------------------------------------

/// Source buffer properties the generator needs to resolve grain positions and rates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SourceInfo {
    pub frame_count: usize,
    pub sample_rate: u32,
}

// -------------------------------------------------------------------------------------------------

/// Stateful grain event synthesizer: turns engine parameters into a stream of grain events.
///
/// All random values of a grain are drawn in a fixed order and every draw always happens,
/// even when the parameter it feeds is disabled. This keeps the random streams of two runs
/// aligned when only some parameters differ.
#[derive(Debug, Clone)]
pub(crate) struct GrainGenerator {
    rng: SeededRng,
    /// Nominal start time of the next grain in output samples.
    cursor: f64,
    /// Cursor position at the start of the current run, for the scan animation.
    run_start: f64,
    /// Panning of the last emitted grain, for the stereo link.
    previous_pan: f64,
}

impl GrainGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            rng: SeededRng::new(seed),
            cursor: 0.0,
            run_start: 0.0,
            previous_pan: 0.0,
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Move the cursor to the given time without restarting the scan animation.
    pub fn set_cursor(&mut self, cursor: f64) {
        self.cursor = cursor.max(0.0);
    }

    /// Start a new run at the given time.
    pub fn start_run(&mut self, cursor: f64) {
        self.set_cursor(cursor);
        self.run_start = self.cursor;
    }

    /// Re-seed the random generator. Cursor and run state are kept.
    pub fn reset_seed(&mut self, seed: u32) {
        self.rng.reset(seed);
    }

    /// Re-seed and rewind everything to time zero.
    pub fn reset(&mut self, seed: u32) {
        self.rng.reset(seed);
        self.cursor = 0.0;
        self.run_start = 0.0;
        self.previous_pan = 0.0;
    }

    /// Synthesize the grain at the current cursor position and advance the cursor by one grain
    /// period. Grains never start before `earliest_start`.
    pub fn next_grain(
        &mut self,
        parameters: &EngineParameters,
        source: SourceInfo,
        earliest_start: SampleTime,
    ) -> GrainEvent {
        // fixed draw order
        let timing_draw = self.rng.next_f64();
        let size_draw = self.rng.next_f64();
        let scan_draw = self.rng.next_f64();
        let position_draw = self.rng.next_f64();
        let pitch_draw = self.rng.gaussian(0.0, 1.0);
        let reverse_draw = self.rng.next_f64();
        let pan_draw = self.rng.next_f64();
        let amplitude_draw = self.rng.next_f64();

        let start_time = (self.cursor + (timing_draw - 0.5) * parameters.timing_jitter)
            .round()
            .max(earliest_start as f64) as SampleTime;

        let duration = (parameters.grain_size
            * (1.0 + bipolar(size_draw) * parameters.size_jitter))
            .round()
            .max(GrainEvent::MIN_DURATION as f64) as u32;

        let position = {
            let center = self.scan_center(parameters);
            let offset = bipolar(scan_draw) * parameters.scan_width() / 2.0;
            let jitter = if source.frame_count > 0 && source.sample_rate > 0 {
                let jitter_frames = parameters.position_jitter * source.sample_rate as f64
                    / parameters.sample_rate as f64;
                bipolar(position_draw) * jitter_frames / source.frame_count as f64
            } else {
                0.0
            };
            (center + offset + jitter).clamp(0.0, 1.0)
        };

        let rate = {
            let semitones = parameters.pitch + pitch_draw * parameters.pitch_spread;
            let resampling = if source.sample_rate > 0 {
                source.sample_rate as f64 / parameters.sample_rate as f64
            } else {
                1.0
            };
            let rate = 2.0_f64.powf(semitones / 12.0) * resampling;
            if reverse_draw < parameters.reverse_probability {
                -rate
            } else {
                rate
            }
        };

        let (left_gain, right_gain) = {
            let raw_pan = bipolar(pan_draw) * parameters.pan_spread;
            let pan = (parameters.stereo_link * self.previous_pan
                + (1.0 - parameters.stereo_link) * raw_pan)
                .clamp(-1.0, 1.0);
            self.previous_pan = pan;
            let variance = db_to_linear(
                (bipolar(amplitude_draw) * parameters.amplitude_variance_db as f64) as f32,
            );
            let gain = variance * parameters.gain;
            let (left, right) = equal_power_pan(pan);
            (left * gain, right * gain)
        };

        self.cursor += parameters.grain_period();

        GrainEvent {
            start_time,
            position,
            duration,
            rate,
            left_gain,
            right_gain,
            window: parameters.window,
            attack: parameters.attack,
            hold: parameters.hold,
            decay: parameters.decay,
        }
    }

    /// Animated scan center: a triangle wave sweeping from scan start to scan end and back.
    fn scan_center(&self, parameters: &EngineParameters) -> f64 {
        if parameters.scan_rate_hz <= 0.0 {
            return (parameters.scan_start + parameters.scan_end) / 2.0;
        }
        let elapsed = (self.cursor - self.run_start).max(0.0) / parameters.sample_rate as f64;
        let phase = (elapsed * parameters.scan_rate_hz).fract();
        let triangle = 1.0 - (2.0 * phase - 1.0).abs();
        parameters.scan_start + triangle * parameters.scan_width()
    }
}

/// Map a [0, 1) draw to [-1, 1).
#[inline]
fn bipolar(value: f64) -> f64 {
    2.0 * value - 1.0
}

/// Equal-power gains for the given pan in range [-1, 1].
fn equal_power_pan(pan: f64) -> (f32, f32) {
    let angle = (pan + 1.0) * std::f64::consts::FRAC_PI_4;
    (angle.cos() as f32, angle.sin() as f32)
}

// -------------------------------------------------------------------------------------------------
