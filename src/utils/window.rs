//! Grain window functions with an optional skew transform.

use serde::{Deserialize, Serialize};

// -------------------------------------------------------------------------------------------------

/// Grain window shape selection.
///
/// Note: windows are not normalized: different modes produce different grain energies.
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
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum GrainWindowMode {
    /// Raised cosine: 0 at both edges, 1 at the center.
    #[default]
    Hann,
    /// Bell curve with configurable width. Does not reach 0 at the edges.
    Gaussian,
    /// Classic DSP window with a steeper rolloff than Hann.
    Blackman,
    /// Constant 1: deliberately harsh, clicky grains.
    Rectangular,
    /// Flat center with cosine tapered edges.
    Tukey,
    /// Linear ramps with a flat top.
    Trapezoid,
}

// -------------------------------------------------------------------------------------------------

/// Complete window description of a grain: shape, skew and shape specific width.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrainWindow {
    /// Window shape.
    pub mode: GrainWindowMode,
    /// Skew in range [-1, 1]: < 0 moves energy to the grain's start, > 0 to its end.
    pub skew: f32,
    /// Relative width of the [`GrainWindowMode::Gaussian`] bell in range (0, 1].
    pub gaussian_width: f32,
}

impl Default for GrainWindow {
    fn default() -> Self {
        Self {
            mode: GrainWindowMode::Hann,
            skew: 0.0,
            gaussian_width: Self::DEFAULT_GAUSSIAN_WIDTH,
        }
    }
}

impl GrainWindow {
    pub const DEFAULT_GAUSSIAN_WIDTH: f32 = 0.4;

    /// Tukey taper ratio (fraction of the window that is tapered).
    const TUKEY_ALPHA: f64 = 0.5;
    /// Trapezoid ramp length, relative to the window length.
    const TRAPEZOID_RAMP: f64 = 0.1;
    /// Smallest gaussian width: avoids divisions by zero.
    const MIN_GAUSSIAN_WIDTH: f64 = 0.01;

    pub fn new(mode: GrainWindowMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_skew(mut self, skew: f32) -> Self {
        self.skew = skew;
        self
    }

    pub fn with_gaussian_width(mut self, width: f32) -> Self {
        self.gaussian_width = width;
        self
    }

    /// Evaluate the window at the given normalized phase in range [0, 1], applying the skew
    /// before evaluating the window shape. Returns a gain in range [0, 1].
    #[inline]
    pub fn evaluate(&self, phase: f64) -> f32 {
        let phase = apply_skew(phase, self.skew);
        window(self.mode, phase, self.gaussian_width) as f32
    }
}

// -------------------------------------------------------------------------------------------------

/// Remap the given normalized phase with a power curve.
///
/// `skew` is clamped to [-1, 1]: negative values front-load the window's energy, positive
/// values back-load it, 0 is the identity.
#[inline]
pub fn apply_skew(phase: f64, skew: f32) -> f64 {
    let phase = phase.clamp(0.0, 1.0);
    if skew == 0.0 {
        return phase;
    }
    // exponent in range [1/4, 4]
    let exponent = 4.0f64.powf(skew.clamp(-1.0, 1.0) as f64);
    phase.powf(exponent)
}

// -------------------------------------------------------------------------------------------------

/// Evaluate the window shape at the given normalized phase in range [0, 1].
/// `gaussian_width` is only used by the [`GrainWindowMode::Gaussian`] mode.
pub fn window(mode: GrainWindowMode, phase: f64, gaussian_width: f32) -> f64 {
    use std::f64::consts::{PI, TAU};

    let phase = phase.clamp(0.0, 1.0);
    let value = match mode {
        GrainWindowMode::Hann => 0.5 * (1.0 - (TAU * phase).cos()),
        GrainWindowMode::Gaussian => {
            let sigma = (gaussian_width as f64).max(GrainWindow::MIN_GAUSSIAN_WIDTH) * 0.5;
            let x = (phase - 0.5) / sigma;
            (-0.5 * x * x).exp()
        }
        GrainWindowMode::Blackman => {
            // a0=0.42, a1=0.5, a2=0.08 (standard coefficients)
            0.42 - 0.5 * (TAU * phase).cos() + 0.08 * (2.0 * TAU * phase).cos()
        }
        GrainWindowMode::Rectangular => 1.0,
        GrainWindowMode::Tukey => {
            let width = GrainWindow::TUKEY_ALPHA / 2.0;
            if phase < width {
                0.5 * (1.0 - (PI * phase / width).cos())
            } else if phase > 1.0 - width {
                0.5 * (1.0 - (PI * (1.0 - phase) / width).cos())
            } else {
                1.0
            }
        }
        GrainWindowMode::Trapezoid => {
            let ramp = GrainWindow::TRAPEZOID_RAMP;
            if phase < ramp {
                phase / ramp
            } else if phase > 1.0 - ramp {
                (1.0 - phase) / ramp
            } else {
                1.0
            }
        }
    };
    // Blackman's edges evaluate to tiny negative values
    value.clamp(0.0, 1.0)
}

// -------------------------------------------------------------------------------------------------
