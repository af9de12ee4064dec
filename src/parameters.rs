//! Mapping of user facing [`EngineSettings`] to scheduler ready [`EngineParameters`] and the
//! anti-artifact guard rules.

use crate::{
    settings::{EngineMode, EngineSettings},
    utils::{db_to_linear, time::milliseconds_to_samples, window::GrainWindow},
};

// -------------------------------------------------------------------------------------------------

/// Mode dependent thresholds of the guard rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardRules {
    /// Grains shorter than this (ms) limit the density to `small_grain_max_density`.
    pub small_grain_ms: f32,
    /// Max density (grains/s) for small grains.
    pub small_grain_max_density: f32,
    /// Pitch spreads above this (semitones) raise the high-pass cutoff floor.
    pub pitch_spread_threshold: f32,
    /// High-pass cutoff floor (Hz) for wide pitch spreads.
    pub highpass_floor_hz: f32,
    /// Densities above this (grains/s) cap the amplitude variance.
    pub high_density_threshold: f32,
    /// Max amplitude variance (dB) for high densities.
    pub high_density_max_variance_db: f32,
}

impl GuardRules {
    /// Guard rules of the cinematic preset.
    pub const GUARDED: Self = Self {
        small_grain_ms: 15.0,
        small_grain_max_density: 40.0,
        pitch_spread_threshold: 7.0,
        highpass_floor_hz: 120.0,
        high_density_threshold: 60.0,
        high_density_max_variance_db: 3.0,
    };

    /// Guard rules of the sound design preset.
    pub const FREE: Self = Self {
        small_grain_ms: 5.0,
        small_grain_max_density: 100.0,
        pitch_spread_threshold: 24.0,
        highpass_floor_hz: 40.0,
        high_density_threshold: 200.0,
        high_density_max_variance_db: 6.0,
    };

    /// Guard rules of the given mode.
    pub fn for_mode(mode: EngineMode) -> Self {
        match mode {
            EngineMode::Guarded => Self::GUARDED,
            EngineMode::Free => Self::FREE,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Flattened, pre-validated engine parameters as consumed by the grain scheduler.
///
/// Parameters are derived from [`EngineSettings`] via [`EngineParameters::from_settings`]
/// and get recomputed on every scheduler tick. They are never mutated in place: guard rules
/// return new parameter sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParameters {
    /// Output sample rate.
    pub sample_rate: u32,
    /// Grains per second.
    pub density: f32,
    /// Base grain length in ms. Kept for guard rules only.
    pub grain_size_ms: f32,
    /// Base grain length in samples.
    pub grain_size: f64,
    /// Random grain length variation (fraction of the grain size).
    pub size_jitter: f64,
    /// Max simultaneously sounding grains.
    pub max_voices: usize,
    /// Normalized start of the scan region.
    pub scan_start: f64,
    /// Normalized end of the scan region.
    pub scan_end: f64,
    /// Scan sweep rate in Hz.
    pub scan_rate_hz: f64,
    /// Random grain position offset in source samples.
    pub position_jitter: f64,
    /// Random grain start time window in output samples.
    pub timing_jitter: f64,
    /// Transposition in semitones.
    pub pitch: f64,
    /// Random transposition std dev in semitones.
    pub pitch_spread: f64,
    /// Probability of a grain playing backwards.
    pub reverse_probability: f64,
    /// Random panning range.
    pub pan_spread: f64,
    /// Correlation with the previous grain's panning.
    pub stereo_link: f64,
    /// Random per grain gain variation in dB.
    pub amplitude_variance_db: f32,
    /// Overall linear output gain.
    pub gain: f32,
    /// Attack time in samples.
    pub attack: u32,
    /// Hold time in samples.
    pub hold: u32,
    /// Decay time in samples.
    pub decay: u32,
    /// Grain window descriptor.
    pub window: GrainWindow,
    /// High-pass cutoff of the post processing chain in Hz.
    pub highpass_hz: f32,
    /// Dry/wet mix of the post processing chain.
    pub post_mix: f32,
}

impl EngineParameters {
    /// Clamp, map and guard the given settings.
    pub fn from_settings(settings: &EngineSettings, sample_rate: u32) -> Self {
        let settings = settings.clamped();
        let rules = GuardRules::for_mode(settings.mode);
        apply_guard_rules(map_settings(&settings, sample_rate), &rules)
    }

    /// Scan region width in normalized source positions.
    pub fn scan_width(&self) -> f64 {
        self.scan_end - self.scan_start
    }

    /// Nominal distance between two grains in samples.
    pub fn grain_period(&self) -> f64 {
        self.sample_rate as f64 / self.density.max(f32::EPSILON) as f64
    }
}

// -------------------------------------------------------------------------------------------------

/// Convert the given, already clamped settings into scheduler units. Does not apply guard rules.
pub fn map_settings(settings: &EngineSettings, sample_rate: u32) -> EngineParameters {
    let to_samples = |ms: f32| milliseconds_to_samples(ms as f64, sample_rate);

    let half_width = settings.scan_width as f64 / 2.0;
    let center = settings.scan_center as f64;
    let scan_start = (center - half_width).clamp(0.0, 1.0);
    let scan_end = (center + half_width).clamp(0.0, 1.0);

    EngineParameters {
        sample_rate,
        density: settings.density,
        grain_size_ms: settings.grain_size_ms,
        grain_size: to_samples(settings.grain_size_ms),
        size_jitter: settings.size_jitter as f64,
        max_voices: settings.max_voices as usize,
        scan_start,
        scan_end,
        scan_rate_hz: settings.scan_rate_hz as f64,
        position_jitter: to_samples(settings.position_jitter_ms),
        timing_jitter: to_samples(settings.timing_jitter_ms),
        pitch: settings.pitch_semitones as f64,
        pitch_spread: settings.pitch_spread_semitones as f64,
        reverse_probability: settings.reverse_probability as f64,
        pan_spread: settings.pan_spread as f64,
        stereo_link: settings.stereo_link as f64,
        amplitude_variance_db: settings.amplitude_variance_db,
        gain: db_to_linear(settings.gain_db),
        attack: to_samples(settings.attack_ms).round() as u32,
        hold: to_samples(settings.hold_ms).round() as u32,
        decay: to_samples(settings.decay_ms).round() as u32,
        window: GrainWindow {
            mode: settings.window_mode,
            skew: settings.window_skew,
            gaussian_width: settings.gaussian_width,
        },
        highpass_hz: settings.highpass_hz,
        post_mix: settings.post_mix,
    }
}

// -------------------------------------------------------------------------------------------------

/// Run all guard rules on the given parameters.
pub fn apply_guard_rules(parameters: EngineParameters, rules: &GuardRules) -> EngineParameters {
    let parameters = limit_small_grain_density(parameters, rules);
    let parameters = raise_highpass_floor(parameters, rules);
    cap_amplitude_variance(parameters, rules)
}

/// Tiny, dense grains cause runaway voice counts: limit the density of small grains.
pub fn limit_small_grain_density(
    parameters: EngineParameters,
    rules: &GuardRules,
) -> EngineParameters {
    if parameters.grain_size_ms < rules.small_grain_ms
        && parameters.density > rules.small_grain_max_density
    {
        log::debug!(
            "Limiting density of {}ms grains from {} to {} grains/s",
            parameters.grain_size_ms,
            parameters.density,
            rules.small_grain_max_density
        );
        EngineParameters {
            density: rules.small_grain_max_density,
            ..parameters
        }
    } else {
        parameters
    }
}

/// Extreme pitch spreads produce low frequency rumble: raise the post high-pass cutoff floor.
pub fn raise_highpass_floor(parameters: EngineParameters, rules: &GuardRules) -> EngineParameters {
    if parameters.pitch_spread > rules.pitch_spread_threshold as f64
        && parameters.highpass_hz < rules.highpass_floor_hz
    {
        log::debug!(
            "Raising high-pass cutoff from {}Hz to {}Hz for a pitch spread of {} semitones",
            parameters.highpass_hz,
            rules.highpass_floor_hz,
            parameters.pitch_spread
        );
        EngineParameters {
            highpass_hz: rules.highpass_floor_hz,
            ..parameters
        }
    } else {
        parameters
    }
}

/// Random gain spikes add up at high densities: cap the per grain amplitude variance.
pub fn cap_amplitude_variance(
    parameters: EngineParameters,
    rules: &GuardRules,
) -> EngineParameters {
    if parameters.density > rules.high_density_threshold
        && parameters.amplitude_variance_db > rules.high_density_max_variance_db
    {
        log::debug!(
            "Capping amplitude variance from {}dB to {}dB at {} grains/s",
            parameters.amplitude_variance_db,
            rules.high_density_max_variance_db,
            parameters.density
        );
        EngineParameters {
            amplitude_variance_db: rules.high_density_max_variance_db,
            ..parameters
        }
    } else {
        parameters
    }
}

// -------------------------------------------------------------------------------------------------
