mod audio;
mod emulator;
mod input;

use std::path::PathBuf;

use anyhow::Context;
use chip8_vm::ShiftQuirk;
use chip8_vm::state::{DEFAULT_FRAME_RATE, DEFAULT_INSTRUCTIONS_PER_SECOND, Settings};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the CHIP-8 ROM
    rom: PathBuf,

    /// Timer ticks (and frames) per second
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    frame_rate: u64,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    ips: u64,

    /// How 8xy6/8xyE pick the value to shift
    #[arg(long, value_enum, default_value_t = ShiftQuirk::LoadVy)]
    shift_quirk: ShiftQuirk,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// Beep frequency in Hz
    #[arg(long, default_value_t = audio::DEFAULT_FREQUENCY)]
    tone: f32,

    /// Disable sound
    #[arg(long)]
    mute: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let settings = Settings::new(args.frame_rate, args.ips, args.shift_quirk, args.seed);

    let mut emulator = emulator::Emulator::new(&settings, args.rom)?;
    if !args.mute {
        let beeper = audio::Beep::new(args.tone).context("failed to open audio output")?;
        emulator = emulator.with_beeper(beeper);
    }
    emulator.run()
}
