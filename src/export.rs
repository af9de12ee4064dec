//! Offline, non-realtime rendering of grain takes.

use std::time::Duration;

#[cfg(feature = "wav-output")]
use std::path::Path;

use crate::{
    error::Error,
    renderer::GrainRenderer,
    sample::SourceBuffer,
    scheduler::{GrainScheduler, SchedulerConfig},
    settings::EngineSettings,
    utils::{
        buffer::interleaved_to_planar,
        time::{duration_to_sample_time, sample_time_to_duration},
    },
};

// -------------------------------------------------------------------------------------------------

/// Options for [`render_take`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Length of the rendered take.
    pub duration: Duration,
    /// Output sample rate.
    pub sample_rate: u32,
    /// Number of frames the renderer processes at once.
    pub block_size: usize,
    /// Seed of the scheduler's random generator.
    pub seed: u32,
    /// Scheduler timing. Ticks are driven by the rendered audio, not by wall clock time.
    pub config: SchedulerConfig,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(2),
            sample_rate: 48000,
            block_size: 256,
            seed: 0,
            config: SchedulerConfig {
                // no wall clock jitter to compensate offline
                safety_margin: Duration::ZERO,
                ..SchedulerConfig::default()
            },
        }
    }
}

impl ExportOptions {
    /// Check that the options can render a gapless take.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::ParameterError("sample rate must not be 0".to_string()));
        }
        if self.block_size == 0 {
            return Err(Error::ParameterError("block size must not be 0".to_string()));
        }
        self.config.validate()?;
        // the scheduler's view of the clock lags by up to a clock report interval, a tick
        // interval and one block: the lookahead must cover that
        let block_duration = sample_time_to_duration(self.block_size as u64, self.sample_rate);
        let max_clock_lag =
            self.config.clock_report_interval + self.config.tick_interval + block_duration;
        if self.config.lookahead <= max_clock_lag {
            return Err(Error::ParameterError(format!(
                "lookahead ({:?}) must be greater than the max clock lag ({:?})",
                self.config.lookahead, max_clock_lag
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// An interleaved stereo audio take, as rendered by [`render_take`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTake {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl RenderedTake {
    pub const CHANNEL_COUNT: usize = 2;

    /// Interleaved stereo samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        Self::CHANNEL_COUNT
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / Self::CHANNEL_COUNT
    }

    pub fn duration(&self) -> Duration {
        sample_time_to_duration(self.frame_count() as u64, self.sample_rate)
    }

    /// Absolute peak value of all samples.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }

    /// Deinterleave into a left and right channel.
    pub fn to_planar(&self) -> Vec<Vec<f32>> {
        let mut planar = vec![vec![0.0; self.frame_count()]; Self::CHANNEL_COUNT];
        interleaved_to_planar(&self.samples, &mut planar);
        planar
    }

    /// Write the take into a 32 bit float WAV file.
    #[cfg(feature = "wav-output")]
    pub fn write_wav<P: AsRef<Path>>(&self, file_path: P) -> Result<(), Error> {
        let spec = hound::WavSpec {
            channels: Self::CHANNEL_COUNT as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(file_path, spec)?;
        for sample in &self.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Render a take of the given source with the given settings, as fast as possible.
///
/// The take is rendered with the same scheduler and renderer a realtime host uses, but the
/// scheduler gets ticked whenever a tick interval of audio got rendered. The result only
/// depends on the arguments: rendering twice with the same seed yields the same take.
pub fn render_take(
    settings: &EngineSettings,
    source: SourceBuffer,
    options: &ExportOptions,
) -> Result<RenderedTake, Error> {
    options.validate()?;

    let channel_count = RenderedTake::CHANNEL_COUNT;
    let max_voices = settings.clamped().max_voices as usize;
    let mut renderer = GrainRenderer::new(options.sample_rate, channel_count, max_voices);
    let mut scheduler =
        GrainScheduler::new(&renderer, settings.clone(), options.seed, options.config)?;
    scheduler.set_buffer(source)?;
    scheduler.start()?;

    let frame_count = duration_to_sample_time(options.duration, options.sample_rate) as usize;
    let tick_frames = duration_to_sample_time(options.config.tick_interval, options.sample_rate)
        .max(1) as usize;

    let mut samples = vec![0.0; frame_count * channel_count];
    let mut frames_since_tick = tick_frames;
    for block in samples.chunks_mut(options.block_size * channel_count) {
        if frames_since_tick >= tick_frames {
            scheduler.tick();
            frames_since_tick = 0;
        }
        renderer.process(block);
        frames_since_tick += block.len() / channel_count;
    }
    scheduler.stop()?;

    let stats = renderer.stats();
    log::debug!(
        "Rendered {} frames: {} grains scheduled, {} dropped, {} late",
        frame_count,
        scheduler.emitted_grain_count(),
        stats.dropped_events,
        stats.late_events
    );

    Ok(RenderedTake {
        samples,
        sample_rate: options.sample_rate,
    })
}

// -------------------------------------------------------------------------------------------------
