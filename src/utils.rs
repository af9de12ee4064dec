//! Shared DSP, timing and randomness helpers of the grain engine.

pub mod ahd;
pub mod buffer;
pub(crate) mod event;
pub mod interpolation;
pub mod random;
pub mod time;
pub mod window;

// -------------------------------------------------------------------------------------------------

const MINUS_INF_IN_DB: f32 = -200.0f32;

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
macro_rules! assert_eq_with_epsilon {
    ($x:expr, $y:expr, $d:expr) => {
        if !(($x - $y).abs() <= $d) {
            panic!(
                "assertion failed: `{:?}` is not within `{:?}` of `{:?}`",
                $x, $d, $y
            );
        }
    };
}

#[cfg(test)]
pub(crate) use assert_eq_with_epsilon;

// -------------------------------------------------------------------------------------------------

/// Convert a decibel value to a linear gain factor.
pub fn db_to_linear(value: f32) -> f32 {
    const DB_TO_LIN_FACTOR: f32 = std::f32::consts::LN_10 / 20.0f32;
    if value == 0.0f32 {
        return 1.0f32; // avoid rounding errors at exactly 0 dB
    } else if value > MINUS_INF_IN_DB {
        return (value * DB_TO_LIN_FACTOR).exp();
    }
    0.0f32
}

// -------------------------------------------------------------------------------------------------
