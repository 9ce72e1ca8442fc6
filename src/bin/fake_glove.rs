//! Simulated glove bridge
//!
//! Behaves like the native bridge from the display's point of view: takes the
//! port as its only positional argument, reports progress on stderr and
//! streams `<gesture>,<v0>,...,<v17>` lines on stdout at the glove's packet
//! rate. Useful for running the display without hardware and for tests.
//!
//! ```text
//! fake-glove USB0 --rate 60
//! fake-glove USB0 --count 100 --malformed-every 10
//! fake-glove USB0 --replay captured.log
//! ```

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use glove_feedback::protocol::{encode_record, GestureId, GestureRecord, CHANNEL_COUNT};

#[derive(Parser, Debug)]
#[command(name = "fake-glove", about = "Simulated 5DT glove bridge")]
struct Args {
    /// Port the glove would be opened on (only reported)
    #[arg(default_value = "USB0")]
    port: String,

    /// Packets per second; 0 streams as fast as possible
    #[arg(long, default_value_t = 60)]
    rate: u32,

    /// Exit after this many lines
    #[arg(long)]
    count: Option<u64>,

    /// Seconds of simulated auto-calibration before streaming
    #[arg(long, default_value_t = 0)]
    calibrate_secs: u64,

    /// Stream the lines of this file instead of synthetic data
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replace every Nth line with a truncated record
    #[arg(long)]
    malformed_every: Option<u64>,

    /// Seed for the synthetic data
    #[arg(long)]
    seed: Option<u64>,
}

/// Smooth open/close cycle with a little sensor noise
struct HandMotion {
    rng: StdRng,
    t: f64,
    step: f64,
}

impl HandMotion {
    fn new(seed: Option<u64>, rate: u32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            t: 0.0,
            step: 1.0 / rate.max(1) as f64,
        }
    }

    fn next_record(&mut self, index: u64) -> GestureRecord {
        let mut reading = [0.0f64; CHANNEL_COUNT];
        for (channel, value) in reading.iter_mut().enumerate() {
            let phase = channel as f64 * 0.3;
            let base = 0.5 + 0.45 * (TAU * 0.5 * self.t + phase).sin();
            let noise: f64 = self.rng.gen_range(-0.02..0.02);
            *value = (base + noise).clamp(0.0, 1.0);
        }
        self.t += self.step;

        GestureRecord {
            // Cycle through -1..=15 so consumers can check ordering
            gesture: GestureId((index % 17) as i32 - 1),
            reading,
        }
    }
}

fn calibrate(secs: u64) {
    if secs == 0 {
        return;
    }
    log::info!("--- AUTO-CALIBRATION ---");
    log::info!("Open and close the hand as wide as possible for {} seconds.", secs);
    for remaining in (1..=secs).rev() {
        log::info!("Calibrating... {}s remaining", remaining);
        thread::sleep(Duration::from_secs(1));
    }
    log::info!("Calibration complete.");
}

fn load_replay(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Could not open replay file {:?}", path))?;
    BufReader::new(file)
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("Could not read replay file {:?}", path))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("Opening simulated glove on {} .. success.", args.port);
    log::info!("Number of sensors: {}", CHANNEL_COUNT);
    calibrate(args.calibrate_secs);

    let replay = match &args.replay {
        Some(path) => Some(load_replay(path)?),
        None => None,
    };
    let count = match (&replay, args.count) {
        (Some(lines), Some(count)) => count.min(lines.len() as u64),
        (Some(lines), None) => lines.len() as u64,
        (None, count) => count.unwrap_or(u64::MAX),
    };

    let period = (args.rate > 0).then(|| Duration::from_secs_f64(1.0 / args.rate as f64));
    let mut motion = HandMotion::new(args.seed, args.rate);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    log::info!("--- STREAMING ---");
    for index in 0..count {
        let malformed = args
            .malformed_every
            .map(|n| n > 0 && (index + 1) % n == 0)
            .unwrap_or(false);

        let line = match &replay {
            Some(lines) => lines[index as usize].clone(),
            None => encode_record(&motion.next_record(index)),
        };
        let line = if malformed {
            line.split(',').take(3).collect::<Vec<_>>().join(",")
        } else {
            line
        };

        // The reader went away; nothing left to do
        if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
            log::info!("Display closed the stream.");
            return Ok(());
        }

        if let Some(period) = period {
            thread::sleep(period);
        }
    }

    log::info!("Closing glove after {} lines.", count);
    Ok(())
}
