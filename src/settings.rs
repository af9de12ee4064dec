//! User facing engine settings and their mode dependent legal ranges.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::utils::window::GrainWindowMode;

// -------------------------------------------------------------------------------------------------

/// Engine preset which defines the legal ranges of all settings and the guard rules.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum EngineMode {
    /// Cinematic preset: conservative ranges and strict anti-artifact rules.
    #[default]
    Guarded,
    /// Sound design preset: wide ranges, only rules that prevent runaway voice counts.
    Free,
}

impl EngineMode {
    /// Legal setting ranges of this mode.
    pub fn ranges(&self) -> &'static SettingsRanges {
        match self {
            EngineMode::Guarded => &GUARDED_RANGES,
            EngineMode::Free => &FREE_RANGES,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Legal value ranges for all [`EngineSettings`] fields of an [`EngineMode`].
#[derive(Debug, Clone)]
pub struct SettingsRanges {
    pub grain_size_ms: RangeInclusive<f32>,
    pub size_jitter: RangeInclusive<f32>,
    pub density: RangeInclusive<f32>,
    pub max_voices: RangeInclusive<u32>,
    pub scan_center: RangeInclusive<f32>,
    pub scan_width: RangeInclusive<f32>,
    pub scan_rate_hz: RangeInclusive<f32>,
    pub position_jitter_ms: RangeInclusive<f32>,
    pub timing_jitter_ms: RangeInclusive<f32>,
    pub pitch_semitones: RangeInclusive<f32>,
    pub pitch_spread_semitones: RangeInclusive<f32>,
    pub reverse_probability: RangeInclusive<f32>,
    pub pan_spread: RangeInclusive<f32>,
    pub stereo_link: RangeInclusive<f32>,
    pub window_skew: RangeInclusive<f32>,
    pub gaussian_width: RangeInclusive<f32>,
    pub amplitude_variance_db: RangeInclusive<f32>,
    pub attack_ms: RangeInclusive<f32>,
    pub hold_ms: RangeInclusive<f32>,
    pub decay_ms: RangeInclusive<f32>,
    pub highpass_hz: RangeInclusive<f32>,
    pub post_mix: RangeInclusive<f32>,
    pub gain_db: RangeInclusive<f32>,
}

static GUARDED_RANGES: SettingsRanges = SettingsRanges {
    grain_size_ms: 10.0..=500.0,
    size_jitter: 0.0..=0.5,
    density: 1.0..=80.0,
    max_voices: 1..=64,
    scan_center: 0.0..=1.0,
    scan_width: 0.0..=1.0,
    scan_rate_hz: 0.0..=2.0,
    position_jitter_ms: 0.0..=250.0,
    timing_jitter_ms: 0.0..=50.0,
    pitch_semitones: -24.0..=24.0,
    pitch_spread_semitones: 0.0..=12.0,
    reverse_probability: 0.0..=1.0,
    pan_spread: 0.0..=1.0,
    stereo_link: 0.0..=1.0,
    window_skew: -0.75..=0.75,
    gaussian_width: 0.2..=1.0,
    amplitude_variance_db: 0.0..=12.0,
    attack_ms: 1.0..=500.0,
    hold_ms: 0.0..=2000.0,
    decay_ms: 1.0..=2000.0,
    highpass_hz: 20.0..=2000.0,
    post_mix: 0.0..=1.0,
    gain_db: -60.0..=0.0,
};

static FREE_RANGES: SettingsRanges = SettingsRanges {
    grain_size_ms: 1.0..=2000.0,
    size_jitter: 0.0..=1.0,
    density: 0.5..=400.0,
    max_voices: 1..=256,
    scan_center: 0.0..=1.0,
    scan_width: 0.0..=1.0,
    scan_rate_hz: 0.0..=20.0,
    position_jitter_ms: 0.0..=2000.0,
    timing_jitter_ms: 0.0..=500.0,
    pitch_semitones: -48.0..=48.0,
    pitch_spread_semitones: 0.0..=48.0,
    reverse_probability: 0.0..=1.0,
    pan_spread: 0.0..=1.0,
    stereo_link: 0.0..=1.0,
    window_skew: -1.0..=1.0,
    gaussian_width: 0.05..=1.0,
    amplitude_variance_db: 0.0..=24.0,
    attack_ms: 0.0..=2000.0,
    hold_ms: 0.0..=2000.0,
    decay_ms: 0.0..=2000.0,
    highpass_hz: 0.0..=2000.0,
    post_mix: 0.0..=1.0,
    gain_db: -60.0..=12.0,
};

// -------------------------------------------------------------------------------------------------

/// User facing configuration of the grain engine.
///
/// Settings are produced and edited externally (UI, presets) and get pushed into the scheduler,
/// which clamps them to the legal ranges of their [`EngineMode`] before mapping them to
/// [`EngineParameters`](crate::EngineParameters). They serialize as a plain structured blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Preset defining legal ranges and guard rules.
    pub mode: EngineMode,
    /// Base length of each grain in milliseconds.
    pub grain_size_ms: f32,
    /// Random grain length variation as fraction of the grain size.
    pub size_jitter: f32,
    /// Number of grains spawned per second.
    pub density: f32,
    /// Max number of simultaneously sounding grains.
    pub max_voices: u32,
    /// Normalized center position of the scan region in the source.
    pub scan_center: f32,
    /// Normalized width of the scan region in the source.
    pub scan_width: f32,
    /// Rate in Hz at which the scan center sweeps back and forth through the scan region.
    /// 0 disables the sweep.
    pub scan_rate_hz: f32,
    /// Random grain start position offset in milliseconds of source material.
    pub position_jitter_ms: f32,
    /// Random grain start time offset window in milliseconds.
    pub timing_jitter_ms: f32,
    /// Transposition of all grains in semitones.
    pub pitch_semitones: f32,
    /// Standard deviation of the random per grain transposition in semitones.
    pub pitch_spread_semitones: f32,
    /// Probability that a grain plays backwards.
    pub reverse_probability: f32,
    /// Random stereo panning range of the grains.
    pub pan_spread: f32,
    /// Correlation of a grain's panning with the previous grain's panning.
    pub stereo_link: f32,
    /// Grain window shape.
    pub window_mode: GrainWindowMode,
    /// Grain window skew.
    pub window_skew: f32,
    /// Relative width of the gaussian window.
    pub gaussian_width: f32,
    /// Random per grain amplitude variation in decibels.
    pub amplitude_variance_db: f32,
    /// Grain envelope attack time in milliseconds.
    pub attack_ms: f32,
    /// Grain envelope hold time in milliseconds.
    pub hold_ms: f32,
    /// Grain envelope decay time in milliseconds.
    pub decay_ms: f32,
    /// High-pass cutoff of the post processing chain in Hz.
    pub highpass_hz: f32,
    /// Dry/wet mix of the post processing chain.
    pub post_mix: f32,
    /// Overall output gain in decibels.
    pub gain_db: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mode: EngineMode::Guarded,
            grain_size_ms: 60.0,
            size_jitter: 0.1,
            density: 20.0,
            max_voices: 64,
            scan_center: 0.5,
            scan_width: 0.1,
            scan_rate_hz: 0.0,
            position_jitter_ms: 10.0,
            timing_jitter_ms: 5.0,
            pitch_semitones: 0.0,
            pitch_spread_semitones: 0.0,
            reverse_probability: 0.0,
            pan_spread: 0.3,
            stereo_link: 0.0,
            window_mode: GrainWindowMode::Hann,
            window_skew: 0.0,
            gaussian_width: 0.4,
            amplitude_variance_db: 0.0,
            attack_ms: 5.0,
            hold_ms: 40.0,
            decay_ms: 15.0,
            highpass_hz: 20.0,
            post_mix: 0.0,
            gain_db: -6.0,
        }
    }
}

impl EngineSettings {
    pub fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
        .clamped()
    }

    /// Legal value ranges of the current mode.
    pub fn ranges(&self) -> &'static SettingsRanges {
        self.mode.ranges()
    }

    /// Return a copy of the settings with all values clamped into the legal ranges of the
    /// current mode. NaN values are replaced with the field's default value.
    pub fn clamped(&self) -> Self {
        fn clamp(value: f32, default: f32, range: &RangeInclusive<f32>) -> f32 {
            let value = if value.is_nan() { default } else { value };
            value.clamp(*range.start(), *range.end())
        }

        let ranges = self.ranges();
        let defaults = Self::default();
        Self {
            mode: self.mode,
            grain_size_ms: clamp(
                self.grain_size_ms,
                defaults.grain_size_ms,
                &ranges.grain_size_ms,
            ),
            size_jitter: clamp(self.size_jitter, defaults.size_jitter, &ranges.size_jitter),
            density: clamp(self.density, defaults.density, &ranges.density),
            max_voices: self
                .max_voices
                .clamp(*ranges.max_voices.start(), *ranges.max_voices.end()),
            scan_center: clamp(self.scan_center, defaults.scan_center, &ranges.scan_center),
            scan_width: clamp(self.scan_width, defaults.scan_width, &ranges.scan_width),
            scan_rate_hz: clamp(
                self.scan_rate_hz,
                defaults.scan_rate_hz,
                &ranges.scan_rate_hz,
            ),
            position_jitter_ms: clamp(
                self.position_jitter_ms,
                defaults.position_jitter_ms,
                &ranges.position_jitter_ms,
            ),
            timing_jitter_ms: clamp(
                self.timing_jitter_ms,
                defaults.timing_jitter_ms,
                &ranges.timing_jitter_ms,
            ),
            pitch_semitones: clamp(
                self.pitch_semitones,
                defaults.pitch_semitones,
                &ranges.pitch_semitones,
            ),
            pitch_spread_semitones: clamp(
                self.pitch_spread_semitones,
                defaults.pitch_spread_semitones,
                &ranges.pitch_spread_semitones,
            ),
            reverse_probability: clamp(
                self.reverse_probability,
                defaults.reverse_probability,
                &ranges.reverse_probability,
            ),
            pan_spread: clamp(self.pan_spread, defaults.pan_spread, &ranges.pan_spread),
            stereo_link: clamp(self.stereo_link, defaults.stereo_link, &ranges.stereo_link),
            window_mode: self.window_mode,
            window_skew: clamp(self.window_skew, defaults.window_skew, &ranges.window_skew),
            gaussian_width: clamp(
                self.gaussian_width,
                defaults.gaussian_width,
                &ranges.gaussian_width,
            ),
            amplitude_variance_db: clamp(
                self.amplitude_variance_db,
                defaults.amplitude_variance_db,
                &ranges.amplitude_variance_db,
            ),
            attack_ms: clamp(self.attack_ms, defaults.attack_ms, &ranges.attack_ms),
            hold_ms: clamp(self.hold_ms, defaults.hold_ms, &ranges.hold_ms),
            decay_ms: clamp(self.decay_ms, defaults.decay_ms, &ranges.decay_ms),
            highpass_hz: clamp(self.highpass_hz, defaults.highpass_hz, &ranges.highpass_hz),
            post_mix: clamp(self.post_mix, defaults.post_mix, &ranges.post_mix),
            gain_db: clamp(self.gain_db, defaults.gain_db, &ranges.gain_db),
        }
    }
}

// -------------------------------------------------------------------------------------------------
