// -------------------------------------------------------------------------------------------------

/// Fill the given buffer with zeros.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

// -------------------------------------------------------------------------------------------------

/// Copy planar channels into an interleaved buffer.
/// The number of planar channels defines the interleaved frame layout. Surplus frames in
/// either buffer are left untouched.
pub fn planar_to_interleaved(planar: &[Vec<f32>], interleaved: &mut [f32]) {
    let channel_count = planar.len();
    if channel_count == 0 {
        return;
    }
    for (channel_index, channel) in planar.iter().enumerate() {
        for (frame, value) in interleaved
            .chunks_exact_mut(channel_count)
            .zip(channel.iter())
        {
            frame[channel_index] = *value;
        }
    }
}

/// Copy an interleaved buffer into planar channels.
/// The number of planar channels defines the interleaved frame layout. Surplus frames in
/// either buffer are left untouched.
pub fn interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channel_count = planar.len();
    if channel_count == 0 {
        return;
    }
    for (channel_index, channel) in planar.iter_mut().enumerate() {
        for (value, frame) in channel
            .iter_mut()
            .zip(interleaved.chunks_exact(channel_count))
        {
            *value = frame[channel_index];
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear() {
        let mut buffer = vec![1.0, -2.0, 3.0];
        clear_buffer(&mut buffer);
        assert!(buffer.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn interleaving() {
        let planar = vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]];
        let mut interleaved = vec![0.0; 6];
        planar_to_interleaved(&planar, &mut interleaved);
        assert_eq!(interleaved, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);

        let mut deinterleaved = vec![vec![0.0; 3]; 2];
        interleaved_to_planar(&interleaved, &mut deinterleaved);
        assert_eq!(deinterleaved, planar);

        // mono is a plain copy
        let mut mono = vec![vec![0.0; 6]];
        interleaved_to_planar(&interleaved, &mut mono);
        assert_eq!(mono[0], interleaved);
    }
}
