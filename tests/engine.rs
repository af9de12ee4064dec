use std::time::Duration;

use grainshot::{
    render_take, EngineMode, EngineParameters, EngineSettings, ExportOptions, GrainEvent,
    GrainRenderer, GrainScheduler, GrainWindowMode, GuardRules, RendererMessage,
    SchedulerConfig, SourceBuffer,
};

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 48000;
const BLOCK_SIZE: usize = 256;

fn noise_source(seconds: usize) -> SourceBuffer {
    let mut rng = grainshot::utils::random::SeededRng::new(99);
    let samples = (0..seconds * SAMPLE_RATE as usize)
        .map(|_| rng.range(-1.0, 1.0) as f32)
        .collect();
    SourceBuffer::from_mono(samples, SAMPLE_RATE).unwrap()
}

/// Drive a scheduler/renderer pair for the given number of blocks, ticking the scheduler
/// every tick interval of rendered audio.
fn run(
    scheduler: &mut GrainScheduler,
    renderer: &mut GrainRenderer,
    block_count: usize,
    mut on_block: impl FnMut(&GrainRenderer, &[f32]),
) {
    let tick_frames = 960;
    let mut frames_since_tick = tick_frames;
    let mut output = vec![0.0; BLOCK_SIZE * renderer.channel_count()];
    for _ in 0..block_count {
        if frames_since_tick >= tick_frames {
            scheduler.tick();
            frames_since_tick = 0;
        }
        renderer.process(&mut output);
        frames_since_tick += BLOCK_SIZE;
        on_block(renderer, &output);
    }
}

// -------------------------------------------------------------------------------------------------

#[test]
fn schedules_are_deterministic() {
    let settings = EngineSettings {
        mode: EngineMode::Free,
        density: 120.0,
        timing_jitter_ms: 20.0,
        pitch_spread_semitones: 5.0,
        reverse_probability: 0.5,
        pan_spread: 1.0,
        scan_rate_hz: 3.0,
        ..Default::default()
    };

    let schedule = |seed: u32| {
        let renderer = GrainRenderer::new(SAMPLE_RATE, 2, 64);
        let mut scheduler =
            GrainScheduler::new(&renderer, settings.clone(), seed, SchedulerConfig::default())
                .unwrap();
        scheduler.set_buffer(noise_source(1)).unwrap();
        scheduler.start().unwrap();
        scheduler.tick();
        let queue = renderer.message_queue();
        let mut events: Vec<GrainEvent> = Vec::new();
        while let Some(message) = queue.pop() {
            if let RendererMessage::Schedule(batch) = message {
                events.extend(batch.iter().copied());
            }
        }
        events
    };

    let a = schedule(1);
    let b = schedule(1);
    assert!(!a.is_empty());
    assert_eq!(a, b);
    assert_ne!(a, schedule(2));
}

#[test]
fn takes_are_deterministic() {
    let options = ExportOptions {
        duration: Duration::from_millis(400),
        seed: 1234,
        ..Default::default()
    };
    let settings = EngineSettings {
        pitch_spread_semitones: 4.0,
        reverse_probability: 0.3,
        amplitude_variance_db: 3.0,
        ..Default::default()
    };
    let a = render_take(&settings, noise_source(2), &options).unwrap();
    let b = render_take(&settings, noise_source(2), &options).unwrap();
    assert_eq!(a.samples(), b.samples());
}

#[test]
fn monotonic_schedule() {
    let renderer_voices = 64;
    let mut renderer = GrainRenderer::new(SAMPLE_RATE, 2, renderer_voices);
    let settings = EngineSettings {
        timing_jitter_ms: 50.0,
        density: 80.0,
        ..Default::default()
    };
    let mut scheduler =
        GrainScheduler::new(&renderer, settings, 7, SchedulerConfig::default()).unwrap();
    scheduler.set_buffer(noise_source(1)).unwrap();
    scheduler.start().unwrap();

    let mut last_cursor = scheduler.cursor();
    let tick_frames = 960;
    let mut output = vec![0.0; BLOCK_SIZE * 2];
    let mut frames_since_tick = tick_frames;
    for _ in 0..400 {
        if frames_since_tick >= tick_frames {
            scheduler.tick();
            frames_since_tick = 0;
            assert!(scheduler.cursor() >= last_cursor);
            last_cursor = scheduler.cursor();
        }
        renderer.process(&mut output);
        frames_since_tick += BLOCK_SIZE;
    }
    assert!(scheduler.emitted_grain_count() > 0);
    // the scheduler stays ahead of the renderer: nothing arrives late
    assert_eq!(renderer.stats().late_events, 0);
}

#[test]
fn voice_capacity_bound() {
    let max_voices = 4;
    let mut renderer = GrainRenderer::new(SAMPLE_RATE, 2, max_voices);
    let settings = EngineSettings {
        mode: EngineMode::Free,
        grain_size_ms: 500.0,
        density: 400.0,
        ..Default::default()
    };
    let mut scheduler =
        GrainScheduler::new(&renderer, settings, 3, SchedulerConfig::default()).unwrap();
    scheduler.set_buffer(noise_source(1)).unwrap();
    scheduler.start().unwrap();

    let mut max_active = 0;
    run(&mut scheduler, &mut renderer, 200, |renderer, output| {
        assert!(renderer.active_voice_count() <= max_voices);
        assert!(output.iter().all(|s| s.is_finite()));
        max_active = max_active.max(renderer.active_voice_count());
    });
    assert_eq!(max_active, max_voices);
    assert!(renderer.stats().dropped_events > 0);
}

#[test]
fn max_voices_setting_limits_active_voices() {
    let mut renderer = GrainRenderer::new(SAMPLE_RATE, 2, 64);
    let settings = EngineSettings {
        grain_size_ms: 500.0,
        density: 80.0,
        max_voices: 2,
        ..Default::default()
    };
    let mut scheduler =
        GrainScheduler::new(&renderer, settings, 13, SchedulerConfig::default()).unwrap();
    scheduler.set_buffer(noise_source(1)).unwrap();
    scheduler.start().unwrap();

    let mut max_active = 0;
    run(&mut scheduler, &mut renderer, 200, |renderer, _| {
        assert!(renderer.active_voice_count() <= 2);
        max_active = max_active.max(renderer.active_voice_count());
    });
    assert_eq!(max_active, 2);
    assert!(renderer.stats().dropped_events > 0);
}

#[test]
fn stop_flushes_renderer() {
    let mut renderer = GrainRenderer::new(SAMPLE_RATE, 2, 32);
    let settings = EngineSettings {
        grain_size_ms: 300.0,
        density: 40.0,
        ..Default::default()
    };
    let mut scheduler =
        GrainScheduler::new(&renderer, settings, 11, SchedulerConfig::default()).unwrap();
    scheduler.set_buffer(noise_source(1)).unwrap();
    scheduler.start().unwrap();
    run(&mut scheduler, &mut renderer, 40, |_, _| ());
    assert!(renderer.active_voice_count() > 0);

    scheduler.stop().unwrap();
    let mut output = vec![1.0; BLOCK_SIZE * 2];
    renderer.process(&mut output);
    assert!(output.iter().all(|s| *s == 0.0));
    let stats = renderer.stats();
    assert_eq!(stats.active_voices, 0);
    assert_eq!(stats.pending_events, 0);

    // restarting resumes at the renderer's clock
    scheduler.start().unwrap();
    assert!(scheduler.cursor() >= scheduler.last_clock());
    run(&mut scheduler, &mut renderer, 40, |_, _| ());
    assert!(renderer.active_voice_count() > 0);
}

#[test]
fn reset_rewinds_clocks() {
    let mut renderer = GrainRenderer::new(SAMPLE_RATE, 2, 32);
    let mut scheduler = GrainScheduler::new(
        &renderer,
        EngineSettings::default(),
        5,
        SchedulerConfig::default(),
    )
    .unwrap();
    scheduler.set_buffer(noise_source(1)).unwrap();
    scheduler.start().unwrap();
    run(&mut scheduler, &mut renderer, 40, |_, _| ());
    assert!(renderer.clock() > 0);

    scheduler.reset().unwrap();
    let mut output = vec![0.0; BLOCK_SIZE * 2];
    renderer.process(&mut output);
    assert_eq!(renderer.clock(), BLOCK_SIZE as u64);
    assert_eq!(scheduler.last_clock(), 0);
    assert_eq!(scheduler.cursor(), 0);
}

// -------------------------------------------------------------------------------------------------

#[test]
fn silent_source_renders_silence() {
    let settings = EngineSettings {
        density: 60.0,
        grain_size_ms: 25.0,
        max_voices: 64,
        ..Default::default()
    };
    let source = SourceBuffer::from_mono(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE).unwrap();
    let options = ExportOptions {
        duration: Duration::from_secs(1),
        ..Default::default()
    };
    let take = render_take(&settings, source, &options).unwrap();
    assert_eq!(take.frame_count(), SAMPLE_RATE as usize);
    assert!(take.samples().iter().all(|s| s.is_finite() && *s == 0.0));
}

#[test]
fn reverse_grains_flip_read_direction() {
    // impulses 100 frames after and 300 frames before the grain's read position
    let center = 24000;
    let mut samples = vec![0.0; 2 * center + 1];
    samples[center + 100] = 1.0;
    samples[center - 300] = 0.5;
    let source = SourceBuffer::from_mono(samples, SAMPLE_RATE).unwrap();

    let settings = |reverse_probability: f32| EngineSettings {
        mode: EngineMode::Free,
        grain_size_ms: 25.0,
        size_jitter: 0.0,
        density: 0.5,
        scan_center: 0.5,
        scan_width: 0.0,
        scan_rate_hz: 0.0,
        position_jitter_ms: 0.0,
        timing_jitter_ms: 0.0,
        pitch_semitones: 0.0,
        pitch_spread_semitones: 0.0,
        reverse_probability,
        pan_spread: 0.0,
        amplitude_variance_db: 0.0,
        window_mode: GrainWindowMode::Rectangular,
        window_skew: 0.0,
        attack_ms: 0.0,
        hold_ms: 0.0,
        decay_ms: 0.0,
        gain_db: 0.0,
        ..Default::default()
    };
    let options = ExportOptions {
        duration: Duration::from_millis(100),
        ..Default::default()
    };

    let peak_frame = |reverse_probability: f32| {
        let take = render_take(&settings(reverse_probability), source.clone(), &options).unwrap();
        let left = &take.to_planar()[0];
        let (frame, value) = left
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .unwrap();
        (frame, value)
    };

    let center_gain = std::f32::consts::FRAC_1_SQRT_2;
    let (forward_frame, forward_value) = peak_frame(0.0);
    assert_eq!(forward_frame, 100);
    assert!((forward_value - center_gain).abs() < 1e-4);

    let (reverse_frame, reverse_value) = peak_frame(1.0);
    assert_eq!(reverse_frame, 300);
    assert!((reverse_value - 0.5 * center_gain).abs() < 1e-4);
}

#[test]
fn small_grains_cap_density() {
    for mode in [EngineMode::Guarded, EngineMode::Free] {
        for density in [50.0, 150.0, 400.0] {
            let settings = EngineSettings {
                mode,
                grain_size_ms: 2.0,
                density,
                ..Default::default()
            };
            let parameters = EngineParameters::from_settings(&settings, SAMPLE_RATE);
            let max_density = GuardRules::for_mode(mode).small_grain_max_density;
            assert!(parameters.density <= max_density);
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(feature = "wav-output")]
#[test]
fn write_wav_file() {
    let options = ExportOptions {
        duration: Duration::from_millis(200),
        ..Default::default()
    };
    let take = render_take(&EngineSettings::default(), noise_source(1), &options).unwrap();
    let path = std::env::temp_dir().join("grainshot_write_wav_file.wav");
    take.write_wav(&path).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);
    assert_eq!(reader.len() as usize, take.samples().len());
    let _ = std::fs::remove_file(path);
}
