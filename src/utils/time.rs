use std::time::Duration;

// -------------------------------------------------------------------------------------------------

/// Absolute time in sample frames.
pub type SampleTime = u64;

// -------------------------------------------------------------------------------------------------

/// Convert milliseconds to sample frames with the given sample rate.
/// Negative or NaN durations result in 0 samples.
pub fn milliseconds_to_samples(milliseconds: f64, sample_rate: u32) -> f64 {
    debug_assert!(sample_rate > 0, "Invalid sample rate");
    (milliseconds.max(0.0) * sample_rate as f64 / 1000.0).max(0.0)
}

/// Convert a duration to sample frames with the given sample rate.
pub fn duration_to_sample_time(duration: Duration, sample_rate: u32) -> SampleTime {
    debug_assert!(sample_rate > 0, "Invalid sample rate");
    (duration.as_secs_f64() * sample_rate as f64) as SampleTime
}

/// Convert sample frames to a duration with the given sample rate.
pub fn sample_time_to_duration(sample_time: SampleTime, sample_rate: u32) -> Duration {
    debug_assert!(sample_rate > 0, "Invalid sample rate");
    Duration::from_secs_f64(sample_time as f64 / sample_rate as f64)
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(milliseconds_to_samples(1000.0, 48000), 48000.0);
        assert_eq!(milliseconds_to_samples(25.0, 48000), 1200.0);
        assert_eq!(milliseconds_to_samples(-5.0, 48000), 0.0);
        assert_eq!(milliseconds_to_samples(f64::NAN, 48000), 0.0);
        assert_eq!(
            duration_to_sample_time(Duration::from_millis(20), 44100),
            882
        );
        assert_eq!(
            sample_time_to_duration(44100, 44100),
            Duration::from_secs(1)
        );
    }
}
