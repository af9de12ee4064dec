use std::{path::PathBuf, time::Duration};

use arg::{parse_args, Args};

use grainshot::{
    render_take,
    utils::random::{random_seed, SeededRng},
    EngineMode, EngineSettings, Error, ExportOptions, GrainWindowMode, SourceBuffer,
};

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

const SAMPLE_RATE: u32 = 48000;

// -------------------------------------------------------------------------------------------------

/// Render a grain take of a generated source into a wav file.
#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Target wav file path. Defaults to \"take.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "d", long = "duration")]
    /// Length of the take in seconds. Defaults to 4.
    duration: Option<f32>,
    #[arg(short = "m", long = "mode")]
    /// Engine mode: \"guarded\" or \"free\".
    mode: Option<EngineMode>,
    #[arg(short = "w", long = "window")]
    /// Grain window: \"hann\", \"gaussian\", \"blackman\", \"rectangular\", \"tukey\" or \"trapezoid\".
    window: Option<GrainWindowMode>,
    #[arg(short = "s", long = "seed")]
    /// Random seed. Defaults to a random one.
    seed: Option<u32>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = parse_args::<Arguments>();

    // Init logger
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");

    let mode = args.mode.unwrap_or_default();
    let settings = EngineSettings {
        grain_size_ms: 80.0,
        density: 30.0,
        scan_width: 0.4,
        scan_rate_hz: 0.25,
        pitch_spread_semitones: 0.3,
        reverse_probability: 0.2,
        pan_spread: 0.7,
        stereo_link: 0.3,
        window_mode: args.window.unwrap_or_default(),
        ..EngineSettings::new(mode)
    };

    let options = ExportOptions {
        duration: Duration::from_secs_f32(args.duration.unwrap_or(4.0).max(0.0)),
        sample_rate: SAMPLE_RATE,
        seed: args.seed.unwrap_or_else(random_seed),
        ..ExportOptions::default()
    };

    let take = render_take(&settings, generate_source()?, &options)?;

    let output_path = args.output_path.unwrap_or_else(|| PathBuf::from("take.wav"));
    take.write_wav(&output_path)?;
    println!(
        "Rendered {:.2}s with seed {} and a peak of {:.2} into '{}'",
        take.duration().as_secs_f32(),
        options.seed,
        take.peak(),
        output_path.display()
    );
    Ok(())
}

// -------------------------------------------------------------------------------------------------

/// Two seconds of plucked, slightly noisy partials with a falling pitch.
fn generate_source() -> Result<SourceBuffer, Error> {
    let frame_count = 2 * SAMPLE_RATE as usize;
    let mut rng = SeededRng::new(0x5EED);
    let mut phase = 0.0_f64;
    let samples = (0..frame_count)
        .map(|index| {
            let time = index as f64 / SAMPLE_RATE as f64;
            let frequency = 440.0 * (1.0 - 0.25 * time / 2.0);
            phase += frequency / SAMPLE_RATE as f64;
            let pluck = (-(time * 4.0 % 1.0) * 6.0).exp();
            let tone = (phase * std::f64::consts::TAU).sin()
                + 0.5 * (2.0 * phase * std::f64::consts::TAU).sin()
                + 0.25 * (3.0 * phase * std::f64::consts::TAU).sin();
            let noise = rng.range(-0.05, 0.05);
            ((tone * 0.4 + noise) * pluck) as f32
        })
        .collect();
    SourceBuffer::from_mono(samples, SAMPLE_RATE)
}
