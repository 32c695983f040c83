use anyhow::{Context, Result};
use blowout_core::{BlowDetector, Capability};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod audio;
mod candle;
mod config;
mod frame_clock;

use audio::Microphone;
use candle::{Candle, Trigger};
use config::AppConfig;
use frame_clock::FrameClock;

#[derive(Parser)]
#[command(name = "blowout")]
#[command(about = "Blowout: blow out a virtual candle with your microphone", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available audio input devices
    List,
    /// Listen for a blow (default). Press Enter to blow by hand, Ctrl+C to quit
    Listen(ListenArgs),
}

#[derive(Args, Default)]
struct ListenArgs {
    /// Input device name (remembered for next time)
    #[arg(short, long)]
    input: Option<String>,
    /// Evaluation frames per second
    #[arg(long)]
    fps: Option<f32>,
    /// Give up after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => list_devices()?,
        Some(Commands::Listen(args)) => listen(args)?,
        None => listen(ListenArgs::default())?,
    }

    Ok(())
}

fn list_devices() -> Result<()> {
    println!("Input Devices:");
    for name in audio::list_input_devices()? {
        println!("  - {}", name);
    }
    Ok(())
}

fn listen(args: ListenArgs) -> Result<()> {
    let mut config = AppConfig::load();
    if let Some(input) = args.input {
        config.last_input = input;
        config.save();
    }
    let frame_rate = args.fps.unwrap_or(config.frame_rate);
    let timeout = args.timeout.or(config.timeout_secs).map(Duration::from_secs);

    let (tx, rx) = crossbeam_channel::unbounded();

    let microphone = Microphone::with_frame_rate(config.last_input.as_str(), frame_rate);
    let mut detector = BlowDetector::with_frame_rate(microphone, frame_rate);
    let blow_tx = tx.clone();
    let capability = detector.start(move || {
        let _ = blow_tx.send(Trigger::Blow);
    });
    if let Capability::Unavailable(e) = &capability {
        println!("Microphone unavailable: {}", e);
    }
    println!("🕯  {}", candle::prompt(capability.is_listening()));

    spawn_click_reader(tx)?;

    // Graceful shutdown handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })?;

    let mut candle = Candle::default();
    let mut clock = FrameClock::new(frame_rate);
    log::debug!("Frame interval {:?}", clock.interval());
    let started = Instant::now();

    while running.load(Ordering::Relaxed) && candle.is_lit() {
        detector.tick();

        for trigger in rx.try_iter() {
            candle.blow_out(trigger);
        }
        if let Some(trigger) = candle.blown_by() {
            log::info!("Candle blown out by {:?}", trigger);
            println!("✨ Candle blown out by {}! Happy birthday! ✨", trigger);
            continue;
        }

        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            println!("No blow detected, giving up.");
            break;
        }

        clock.wait_next();
    }

    detector.stop();
    Ok(())
}

/// Each line on stdin counts as a manual "click".
fn spawn_click_reader(tx: Sender<Trigger>) -> Result<()> {
    thread::Builder::new()
        .name("blowout-click".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if line.is_err() || tx.send(Trigger::Click).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn click reader thread")?;
    Ok(())
}
