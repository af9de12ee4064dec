//! Fractional position sample lookup.

use assume::assume;

// -------------------------------------------------------------------------------------------------

/// Read a single channel's sample buffer at a fractional frame position with 4-point cubic
/// (Catmull-Rom) interpolation.
///
/// Positions outside of the buffer (< 0 or > len - 1) read as silence. Neighbours beyond the
/// buffer edges are clamped to the first or last sample. Buffers with less than two frames
/// read as silence.
#[inline]
pub fn cubic_sample(buffer: &[f32], position: f64) -> f32 {
    let len = buffer.len();
    if len <= 1 || !(position >= 0.0 && position <= (len - 1) as f64) {
        return 0.0;
    }
    let max_index = len - 1;

    let index = (position as usize).min(max_index);
    let fraction = (position - index as f64) as f32;

    // Calculate indices for 4-point cubic interpolation
    let i1 = index;
    let i0 = i1.saturating_sub(1);
    let i2 = (i1 + 1).min(max_index);
    let i3 = (i1 + 2).min(max_index);

    assume!(unsafe: i0 < len);
    let y0 = buffer[i0];
    assume!(unsafe: i1 < len);
    let y1 = buffer[i1];
    assume!(unsafe: i2 < len);
    let y2 = buffer[i2];
    assume!(unsafe: i3 < len);
    let y3 = buffer[i3];

    catmull_rom(y0, y1, y2, y3, fraction)
}

/// Catmull-Rom spline between `y1` and `y2` at the given fraction in range [0, 1].
#[inline]
pub fn catmull_rom(y0: f32, y1: f32, y2: f32, y3: f32, fraction: f32) -> f32 {
    let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
    let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c = -0.5 * y0 + 0.5 * y2;
    let d = y1;

    ((a * fraction + b) * fraction + c) * fraction + d
}

// -------------------------------------------------------------------------------------------------
