//! Control-rate grain scheduler: synthesizes grain events ahead of the renderer's clock.

use std::time::Duration;

use basedrop::{Collector, Owned};
use crossbeam_channel::Receiver;

use crate::{
    error::Error,
    message::{RendererMessage, RendererMessageQueue, SchedulerMessage},
    parameters::EngineParameters,
    renderer::GrainRenderer,
    sample::SourceBuffer,
    settings::EngineSettings,
    utils::time::{duration_to_sample_time, SampleTime},
};

// -------------------------------------------------------------------------------------------------

mod generator;
mod thread;

use generator::{GrainGenerator, SourceInfo};

pub use thread::SchedulerThread;

// -------------------------------------------------------------------------------------------------

/// Timing configuration of the [`GrainScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval at which the scheduler should be ticked.
    pub tick_interval: Duration,
    /// How far ahead of the renderer's clock grains get scheduled.
    pub lookahead: Duration,
    /// Distance to the renderer's clock at which a new run starts.
    pub safety_margin: Duration,
    /// Interval at which the renderer reports its clock.
    pub clock_report_interval: Duration,
    /// Size of the [`SchedulerThread`]'s command queue.
    pub command_queue_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(20),
            lookahead: Duration::from_millis(120),
            safety_margin: Duration::from_millis(20),
            clock_report_interval: Duration::from_millis(40),
            command_queue_size: 64,
        }
    }
}

impl SchedulerConfig {
    /// Check that the timing values are consistent.
    pub fn validate(&self) -> Result<(), Error> {
        if self.tick_interval.is_zero() {
            return Err(Error::ParameterError(
                "tick interval must be greater than zero".to_string(),
            ));
        }
        if self.clock_report_interval.is_zero() {
            return Err(Error::ParameterError(
                "clock report interval must be greater than zero".to_string(),
            ));
        }
        if self.lookahead <= self.tick_interval {
            return Err(Error::ParameterError(format!(
                "lookahead ({:?}) must be greater than the tick interval ({:?})",
                self.lookahead, self.tick_interval
            )));
        }
        if self.lookahead <= self.safety_margin {
            return Err(Error::ParameterError(format!(
                "lookahead ({:?}) must be greater than the safety margin ({:?})",
                self.lookahead, self.safety_margin
            )));
        }
        if self.command_queue_size == 0 {
            return Err(Error::ParameterError(
                "command queue size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Running state of a [`GrainScheduler`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
}

// -------------------------------------------------------------------------------------------------

/// Synthesizes [`GrainEvent`](crate::GrainEvent)s from [`EngineSettings`] and sends them in
/// batches to a [`GrainRenderer`].
///
/// The scheduler runs in a control-rate context and must be ticked regularly, see
/// [`SchedulerConfig::tick_interval`]. Each tick schedules all grains up to the lookahead
/// horizon, relative to the last clock the renderer reported. Use a [`SchedulerThread`] to
/// run the scheduler in its own thread.
///
/// Heap memory sent to the renderer is collected by the scheduler's collector, which gets
/// drained on every tick.
pub struct GrainScheduler {
    sample_rate: u32,
    config: SchedulerConfig,
    settings: EngineSettings,
    seed: u32,
    generator: GrainGenerator,
    state: SchedulerState,
    last_clock: SampleTime,
    /// Incremented with each reset. Clock reports from older epochs get ignored.
    clock_epoch: u32,
    /// Size of the renderer's voice pool.
    voice_capacity: usize,
    /// Voice limit which got delivered to the renderer.
    voice_limit: Option<usize>,
    source: SourceInfo,
    emitted_grain_count: u64,
    message_queue: RendererMessageQueue,
    clock_receiver: Receiver<SchedulerMessage>,
    collector: Collector,
}

impl GrainScheduler {
    /// Create a new idle scheduler which drives the given renderer.
    pub fn new(
        renderer: &GrainRenderer,
        settings: EngineSettings,
        seed: u32,
        config: SchedulerConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            sample_rate: renderer.sample_rate(),
            config,
            settings: settings.clamped(),
            seed,
            generator: GrainGenerator::new(seed),
            state: SchedulerState::Idle,
            last_clock: 0,
            clock_epoch: 0,
            voice_capacity: renderer.max_voices(),
            voice_limit: None,
            source: SourceInfo::default(),
            emitted_grain_count: 0,
            message_queue: renderer.message_queue(),
            clock_receiver: renderer.clock_receiver(),
            collector: Collector::new(),
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Current engine parameters: the clamped and guarded settings.
    pub fn parameters(&self) -> EngineParameters {
        EngineParameters::from_settings(&self.settings, self.sample_rate)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Last clock the renderer reported.
    pub fn last_clock(&self) -> SampleTime {
        self.last_clock
    }

    /// Sample time up to which grains got scheduled.
    pub fn cursor(&self) -> SampleTime {
        self.generator.cursor() as SampleTime
    }

    /// Number of grains which got sent to the renderer since creation.
    pub fn emitted_grain_count(&self) -> u64 {
        self.emitted_grain_count
    }

    /// Start scheduling grains. Does nothing when already running.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.state == SchedulerState::Running {
            return Ok(());
        }
        self.receive_clock();
        self.sync_voice_limit();
        self.send(RendererMessage::ClockStart {
            interval_ms: self.config.clock_report_interval.as_secs_f32() * 1000.0,
        })?;
        let margin = self.samples(self.config.safety_margin);
        self.generator.start_run((self.last_clock + margin) as f64);
        self.state = SchedulerState::Running;
        log::debug!("Grain scheduler started at sample time {}", self.cursor());
        Ok(())
    }

    /// Stop scheduling grains and silence the renderer. Does nothing when not running.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state == SchedulerState::Idle {
            return Ok(());
        }
        self.state = SchedulerState::Idle;
        self.send(RendererMessage::Clear)?;
        self.send(RendererMessage::ClockStop)?;
        log::debug!("Grain scheduler stopped");
        Ok(())
    }

    /// Stop, silence the renderer and rewind the renderer's and the scheduler's clocks to zero.
    /// The random generator restarts with the current seed.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.stop()?;
        let epoch = self.clock_epoch.wrapping_add(1);
        self.send(RendererMessage::Reset { epoch })?;
        self.clock_epoch = epoch;
        // reports from before the reset are stale. Reports which the renderer sends until it
        // applied the reset get filtered by their epoch.
        while self.clock_receiver.try_recv().is_ok() {}
        self.last_clock = 0;
        self.generator.reset(self.seed);
        log::debug!("Grain scheduler reset");
        Ok(())
    }

    /// Re-seed the random generator only.
    pub fn reset_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.generator.reset_seed(seed);
    }

    /// Replace the settings. Takes effect with the next tick.
    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.settings = settings.clamped();
        self.sync_voice_limit();
    }

    /// Replace the renderer's source buffer.
    pub fn set_buffer(&mut self, buffer: SourceBuffer) -> Result<(), Error> {
        let source = SourceInfo {
            frame_count: buffer.frame_count(),
            sample_rate: buffer.sample_rate(),
        };
        if !buffer.is_playable() {
            log::warn!("Source buffer has less than two frames: grains will be silent");
        }
        let handle = self.collector.handle();
        self.send(RendererMessage::SetBuffer(Owned::new(&handle, buffer)))?;
        self.source = source;
        Ok(())
    }

    /// Schedule all grains up to the lookahead horizon.
    ///
    /// Returns the number of grains which got sent to the renderer. When the renderer's message
    /// queue is full, the batch is discarded and regenerated with the next tick.
    pub fn tick(&mut self) -> usize {
        self.collector.collect();
        self.receive_clock();
        self.sync_voice_limit();
        if self.state != SchedulerState::Running {
            return 0;
        }

        let parameters = self.parameters();
        let horizon = (self.last_clock + self.samples(self.config.lookahead)) as f64;

        // generate on a copy: only commit when the batch got delivered
        let mut generator = self.generator.clone();
        let mut events = Vec::new();
        while generator.cursor() < horizon {
            events.push(generator.next_grain(&parameters, self.source, self.last_clock));
        }
        if events.is_empty() {
            return 0;
        }

        let event_count = events.len();
        let handle = self.collector.handle();
        match self
            .message_queue
            .push(RendererMessage::Schedule(Owned::new(&handle, events)))
        {
            Ok(()) => {
                self.generator = generator;
                self.emitted_grain_count += event_count as u64;
                event_count
            }
            Err(_) => {
                log::warn!(
                    "Renderer message queue is full: retrying {} grains with the next tick",
                    event_count
                );
                0
            }
        }
    }

    /// Fetch the newest clock report of the current epoch from the renderer.
    fn receive_clock(&mut self) {
        let epoch = self.clock_epoch;
        let Some(clock) = self
            .clock_receiver
            .try_iter()
            .filter_map(|SchedulerMessage::Clock { time, epoch: report_epoch }| {
                (report_epoch == epoch).then_some(time)
            })
            .last()
        else {
            return;
        };
        // never move backwards
        self.last_clock = self.last_clock.max(clock);
        if self.state == SchedulerState::Running && self.generator.cursor() < self.last_clock as f64
        {
            let margin = self.samples(self.config.safety_margin);
            log::debug!(
                "Grain scheduler fell behind the renderer's clock: skipping to sample time {}",
                self.last_clock + margin
            );
            self.generator.set_cursor((self.last_clock + margin) as f64);
        }
    }

    /// Send the settings' max voices to the renderer when they changed. Failed sends get retried
    /// with the next tick.
    fn sync_voice_limit(&mut self) {
        let requested = self.parameters().max_voices;
        let limit = requested.clamp(1, self.voice_capacity);
        if self.voice_limit == Some(limit) {
            return;
        }
        if requested > self.voice_capacity {
            log::warn!(
                "Max voices ({}) exceed the renderer's voice pool: limiting to {}",
                requested,
                self.voice_capacity
            );
        }
        match self.message_queue.push(RendererMessage::SetVoiceLimit(limit)) {
            Ok(()) => self.voice_limit = Some(limit),
            Err(_) => log::warn!(
                "Renderer message queue is full: retrying voice limit {} with the next tick",
                limit
            ),
        }
    }

    /// Push a control message to the renderer.
    fn send(&self, message: RendererMessage) -> Result<(), Error> {
        self.message_queue.push(message).map_err(|message| {
            log::warn!("Renderer message queue is full: failed to send {message:?}");
            Error::SendError(format!("renderer message queue is full ({message:?})"))
        })
    }

    fn samples(&self, duration: Duration) -> SampleTime {
        duration_to_sample_time(duration, self.sample_rate)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grain::GrainEvent;

    const SAMPLE_RATE: u32 = 48000;

    fn setup() -> (GrainRenderer, GrainScheduler) {
        let renderer = GrainRenderer::new(SAMPLE_RATE, 2, 64);
        let scheduler = GrainScheduler::new(
            &renderer,
            EngineSettings::default(),
            1234,
            SchedulerConfig::default(),
        )
        .unwrap();
        (renderer, scheduler)
    }

    fn constant_source() -> SourceBuffer {
        SourceBuffer::from_mono(vec![0.5; SAMPLE_RATE as usize], SAMPLE_RATE).unwrap()
    }

    fn scheduled_events(renderer: &GrainRenderer) -> Vec<GrainEvent> {
        let queue = renderer.message_queue();
        let mut events = Vec::new();
        while let Some(message) = queue.pop() {
            if let RendererMessage::Schedule(batch) = message {
                events.extend(batch.iter().copied());
            }
        }
        events
    }

    #[test]
    fn config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());
        let config = SchedulerConfig {
            lookahead: Duration::from_millis(10),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ParameterError(_))));
        let config = SchedulerConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let renderer = GrainRenderer::new(SAMPLE_RATE, 2, 8);
        assert!(GrainScheduler::new(&renderer, EngineSettings::default(), 0, config).is_err());
    }

    #[test]
    fn state_machine() {
        let (renderer, mut scheduler) = setup();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.tick(), 0);

        scheduler.start().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        // starts one safety margin ahead of the clock
        assert_eq!(scheduler.cursor(), 960);
        scheduler.start().unwrap();
        assert_eq!(scheduler.cursor(), 960);

        assert!(scheduler.tick() > 0);
        scheduler.stop().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.tick(), 0);

        let queue = renderer.message_queue();
        let messages = std::iter::from_fn(|| queue.pop()).collect::<Vec<_>>();
        assert!(matches!(messages[0], RendererMessage::SetVoiceLimit(64)));
        assert!(matches!(messages[1], RendererMessage::ClockStart { .. }));
        assert!(matches!(messages[2], RendererMessage::Schedule(_)));
        assert!(matches!(messages[3], RendererMessage::Clear));
        assert!(matches!(messages[4], RendererMessage::ClockStop));
        assert_eq!(messages.len(), 5);
    }

    #[test]
    fn schedules_up_to_horizon() {
        let (renderer, mut scheduler) = setup();
        scheduler.start().unwrap();
        let count = scheduler.tick();
        // 100ms from the safety margin to the horizon at 20 grains/s
        assert_eq!(count, 2);
        assert_eq!(scheduler.emitted_grain_count(), 2);
        // nothing new until the clock advances
        assert_eq!(scheduler.tick(), 0);
        let events = scheduled_events(&renderer);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.start_time >= 960 - 120));
    }

    #[test]
    fn monotonic_cursor() {
        let (mut renderer, mut scheduler) = setup();
        scheduler.start().unwrap();
        let mut output = vec![0.0; 480 * 2];
        let mut last_cursor = scheduler.cursor();
        for _ in 0..200 {
            scheduler.tick();
            renderer.process(&mut output);
            assert!(scheduler.cursor() >= last_cursor);
            last_cursor = scheduler.cursor();
        }
        assert!(scheduler.last_clock() > 0);
        assert!(scheduler.emitted_grain_count() > 0);
    }

    #[test]
    fn retries_full_queue() {
        let (renderer, mut scheduler) = setup();
        scheduler.start().unwrap();
        let queue = renderer.message_queue();
        while queue.push(RendererMessage::ClockStop).is_ok() {}

        let cursor = scheduler.cursor();
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(scheduler.cursor(), cursor);
        assert_eq!(scheduler.emitted_grain_count(), 0);
        assert!(matches!(scheduler.stop(), Err(Error::SendError(_))));

        while queue.pop().is_some() {}
        scheduler.start().unwrap();
        assert!(scheduler.tick() > 0);
    }

    #[test]
    fn reset_replays_seed() {
        let (renderer, mut scheduler) = setup();
        scheduler.start().unwrap();
        scheduler.tick();
        let first = scheduled_events(&renderer);

        scheduler.reset().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.last_clock(), 0);
        assert_eq!(scheduler.cursor(), 0);
        let _ = scheduled_events(&renderer);

        scheduler.start().unwrap();
        scheduler.tick();
        assert_eq!(scheduled_events(&renderer), first);

        // a new seed changes the stream
        scheduler.reset().unwrap();
        scheduler.reset_seed(4321);
        scheduler.start().unwrap();
        scheduler.tick();
        assert_ne!(scheduled_events(&renderer), first);
    }

    #[test]
    fn stale_clock_reports_after_reset() {
        let (mut renderer, mut scheduler) = setup();
        scheduler.set_buffer(constant_source()).unwrap();
        scheduler.start().unwrap();
        let mut output = vec![0.0; 480 * 2];
        for _ in 0..100 {
            scheduler.tick();
            renderer.process(&mut output);
        }
        assert!(scheduler.last_clock() > 24000);

        // the renderer keeps reporting its old clock until it applied the reset
        scheduler.reset().unwrap();
        let clock_sender = renderer.clock_sender();
        for time in [renderer.clock(), 480_000] {
            let report = SchedulerMessage::Clock { time, epoch: 0 };
            clock_sender.try_send(report).unwrap();
        }

        scheduler.start().unwrap();
        assert_eq!(scheduler.last_clock(), 0);
        assert_eq!(scheduler.cursor(), 960);
        let mut max_active = 0;
        for _ in 0..20 {
            scheduler.tick();
            renderer.process(&mut output);
            max_active = max_active.max(renderer.active_voice_count());
        }
        // reports of the new epoch are applied
        assert!(scheduler.last_clock() > 0);
        assert!(scheduler.last_clock() <= renderer.clock());
        assert!(scheduler.cursor() < renderer.clock() + 48000);
        assert!(max_active > 0);
    }

    #[test]
    fn voice_limit_follows_settings() {
        let (mut renderer, mut scheduler) = setup();
        scheduler.set_buffer(constant_source()).unwrap();
        scheduler.set_settings(EngineSettings {
            max_voices: 2,
            grain_size_ms: 500.0,
            density: 80.0,
            ..Default::default()
        });
        scheduler.start().unwrap();
        let mut output = vec![0.0; 480 * 2];
        for _ in 0..100 {
            scheduler.tick();
            renderer.process(&mut output);
            assert!(renderer.active_voice_count() <= 2);
        }
        assert_eq!(renderer.voice_limit(), 2);
        assert_eq!(renderer.active_voice_count(), 2);
        assert!(renderer.stats().dropped_events > 0);

        // limits above the pool size are clamped to it
        scheduler.set_settings(EngineSettings {
            mode: crate::settings::EngineMode::Free,
            max_voices: 200,
            ..Default::default()
        });
        scheduler.tick();
        renderer.process(&mut output);
        assert_eq!(renderer.voice_limit(), renderer.max_voices());
    }

    #[test]
    fn settings_are_clamped() {
        let (_renderer, mut scheduler) = setup();
        scheduler.set_settings(EngineSettings {
            density: 10_000.0,
            ..Default::default()
        });
        assert_eq!(scheduler.settings().density, 80.0);
    }
}
