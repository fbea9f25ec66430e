//! dummy-audio - headless runner
//!
//! Drives the dummy audio driver with a test tone for a while and reports
//! how many frames were requested.

use std::env;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use da_audio::backend::configured_mix_rate;
use da_audio::{AudioDriver, DummyAudioDriver, Mixer};
use da_core::config::Config;
use da_core::ProjectSettings;

/// Parsed command line
struct Args {
    seconds: f64,
    sync: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        seconds: 1.0,
        sync: false,
    };

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--sync" => args.sync = true,
            "-h" | "--help" => {
                println!("Usage: dummy-audio [seconds] [--sync]");
                std::process::exit(0);
            }
            other => {
                args.seconds = other
                    .parse()
                    .with_context(|| format!("Invalid duration '{other}'"))?;
                if !args.seconds.is_finite() || args.seconds <= 0.0 {
                    bail!("Duration must be positive, got {other}");
                }
            }
        }
    }

    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let mut config = Config::load().context("Failed to load configuration")?;
    if args.sync {
        config.audio.use_threads = false;
    }

    da_core::logging::init(&config);
    tracing::info!("Starting dummy audio runner");

    let settings = ProjectSettings::from_config(&config);
    // Resolve the rate once so the tone and the driver agree on it
    let mix_rate = configured_mix_rate(&settings);

    let mut driver = DummyAudioDriver::from_config(&config.audio, Mixer::new(mix_rate));
    driver.set_mix_rate(mix_rate);
    driver
        .init(&settings)
        .context("Failed to initialize dummy audio driver")?;
    driver.start();

    let run_for = Duration::from_secs_f64(args.seconds);
    if driver.uses_threads() {
        thread::sleep(run_for);
    } else {
        run_synchronous(&driver, run_for)?;
    }

    let stats = driver.mix_stats();
    let rate = driver.mix_rate();
    let name = driver.name();
    driver.finish();

    let pending = settings.pending_restart_keys();
    if !pending.is_empty() {
        tracing::debug!("Settings differing from defaults: {:?}", pending);
    }

    println!("Driver:         {name}");
    println!("Mix rate:       {rate} Hz");
    println!("Mix calls:      {}", stats.mix_count());
    println!("Frames mixed:   {}", stats.total_frames());
    println!("Audio produced: {:.3} s", stats.total_time(rate));
    println!("Time in mix:    {:?}", stats.busy_time());

    Ok(())
}

/// Pull one buffer period at a time, sleeping between pulls like an
/// external audio clock would.
fn run_synchronous(driver: &DummyAudioDriver, run_for: Duration) -> Result<()> {
    let frames = driver.buffer_frames();
    let period = Duration::from_secs_f64(frames as f64 / f64::from(driver.mix_rate()));
    let mut out = vec![0i32; frames * driver.channels()];

    let started = Instant::now();
    while started.elapsed() < run_for {
        driver.pull(frames, &mut out).context("Synchronous pull failed")?;
        thread::sleep(period);
    }

    Ok(())
}
