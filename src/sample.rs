//! Immutable source recordings which grains read from.

use crate::{
    utils::{
        buffer::{interleaved_to_planar, planar_to_interleaved},
        interpolation::cubic_sample,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// An immutable mono or stereo PCM sample buffer, the source material of all grains.
///
/// Buffers are set once per take and get replaced wholesale: they are never patched. Once
/// transferred to the renderer, the renderer owns the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBuffer {
    channels: Vec<Vec<f32>>,
    frame_count: usize,
    sample_rate: u32,
}

impl SourceBuffer {
    /// Max number of channels a source buffer may have.
    pub const MAX_CHANNELS: usize = 2;

    /// Create a new buffer from planar channel data. All channels must have the same length.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, Error> {
        if channels.is_empty() || channels.len() > Self::MAX_CHANNELS {
            return Err(Error::SourceBufferError(format!(
                "Expected 1 or 2 channels, got {}",
                channels.len()
            )));
        }
        if sample_rate == 0 {
            return Err(Error::SourceBufferError("Invalid sample rate: 0".to_string()));
        }
        let frame_count = channels[0].len();
        if channels.iter().any(|c| c.len() != frame_count) {
            return Err(Error::SourceBufferError(
                "All channels must have the same length".to_string(),
            ));
        }
        Ok(Self {
            channels,
            frame_count,
            sample_rate,
        })
    }

    /// Create a new mono buffer.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, Error> {
        Self::from_planar(vec![samples], sample_rate)
    }

    /// Create a new buffer from interleaved sample data with the given channel layout.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, Error> {
        if channel_count == 0 || channel_count > Self::MAX_CHANNELS {
            return Err(Error::SourceBufferError(format!(
                "Expected 1 or 2 channels, got {channel_count}"
            )));
        }
        if samples.len() % channel_count != 0 {
            return Err(Error::SourceBufferError(
                "Interleaved sample count must be a multiple of the channel count".to_string(),
            ));
        }
        let frame_count = samples.len() / channel_count;
        let mut channels = vec![vec![0.0; frame_count]; channel_count];
        interleaved_to_planar(samples, &mut channels);
        Self::from_planar(channels, sample_rate)
    }

    /// Number of channels (1 or 2).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// The buffer's sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Access the raw planar sample data of the given channel, if present.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Buffers with less than two frames can't be interpolated and play back as silence.
    pub fn is_playable(&self) -> bool {
        self.frame_count > 1
    }

    /// Copy the buffer's content into a new interleaved buffer.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = vec![0.0; self.frame_count * self.channel_count()];
        planar_to_interleaved(&self.channels, &mut interleaved);
        interleaved
    }

    /// Read a left/right sample pair at the given fractional frame position with cubic
    /// interpolation. Mono buffers feed both output channels identically.
    #[inline]
    pub(crate) fn stereo_sample_at(&self, position: f64) -> (f32, f32) {
        match self.channels.as_slice() {
            [mono] => {
                let value = cubic_sample(mono, position);
                (value, value)
            }
            [left, right] => (cubic_sample(left, position), cubic_sample(right, position)),
            _ => (0.0, 0.0),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        assert!(SourceBuffer::from_planar(vec![], 44100).is_err());
        assert!(SourceBuffer::from_planar(vec![vec![0.0]; 3], 44100).is_err());
        assert!(SourceBuffer::from_planar(vec![vec![0.0; 2], vec![0.0; 3]], 44100).is_err());
        assert!(SourceBuffer::from_mono(vec![0.0; 4], 0).is_err());
        assert!(SourceBuffer::from_interleaved(&[0.0; 3], 2, 44100).is_err());

        let buffer = SourceBuffer::from_interleaved(&[1.0, -1.0, 2.0, -2.0], 2, 44100).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channel(0), Some(&[1.0, 2.0][..]));
        assert_eq!(buffer.channel(1), Some(&[-1.0, -2.0][..]));
        assert_eq!(buffer.channel(2), None);
        assert_eq!(buffer.to_interleaved(), vec![1.0, -1.0, 2.0, -2.0]);
        assert!(buffer.is_playable());

        let single = SourceBuffer::from_mono(vec![1.0], 44100).unwrap();
        assert!(!single.is_playable());
        assert_eq!(single.stereo_sample_at(0.0), (0.0, 0.0));
    }

    #[test]
    fn stereo_reads() {
        let mono = SourceBuffer::from_mono(vec![0.0, 0.5, 1.0, 0.5], 48000).unwrap();
        let (l, r) = mono.stereo_sample_at(1.0);
        assert_eq!(l, r);
        assert!((l - 0.5).abs() < 1e-6);

        let stereo =
            SourceBuffer::from_planar(vec![vec![1.0; 4], vec![-1.0; 4]], 48000).unwrap();
        let (l, r) = stereo.stereo_sample_at(1.5);
        assert!((l - 1.0).abs() < 1e-6);
        assert!((r + 1.0).abs() < 1e-6);
    }
}
