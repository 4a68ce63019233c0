use clap::Parser;
use std::path::PathBuf;

use crate::controller::CycleBudget;

#[derive(Parser, Debug)]
#[command(
    name = "chip8-driver",
    about = "Drive a CHIP-8 machine from the terminal",
    long_about = "Loads a ROM, then runs the machine a fixed number of cycles per displayed frame.\n\
                  F5 starts, F6 stops, F10 steps one cycle, Esc quits. The keypad is 1234/qwer/asdf/zxcv.",
    version
)]
pub struct Cli {
    /// ROM to load, by name
    #[arg(default_value = "PONG2")]
    pub rom: String,

    /// Directory ROMs are fetched from
    #[arg(short = 'd', long, default_value = "roms")]
    pub rom_dir: PathBuf,

    /// Cycles executed per displayed frame
    #[arg(short = 'c', long, default_value_t = CycleBudget::DEFAULT.get(),
          value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles_per_frame: u32,

    /// Display refresh rate, in Hz
    #[arg(short = 'f', long, default_value_t = 60.0, value_parser = parse_frame_rate)]
    pub frame_rate: f64,

    /// Frames a key stays down without a repeat, for terminals that don't report releases (0 = forever)
    #[arg(long, default_value_t = 32)]
    pub key_hold_ticks: u32,

    /// Start running as soon as the ROM is loaded
    #[arg(short = 'a', long)]
    pub autostart: bool,

    /// Make the test card machine fault after this many cycles
    #[arg(long)]
    pub halt_after: Option<u64>,
}

fn parse_frame_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|_| format!("'{}' isn't a number", s))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("frame rate must be positive, got {}", s))
    }
}

/// session settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rom: String,
    pub rom_dir: PathBuf,
    pub cycle_budget: CycleBudget,
    pub frame_rate: f64,
    pub key_hold_ticks: u32,
    pub autostart: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rom: "PONG2".to_string(),
            rom_dir: PathBuf::from("roms"),
            cycle_budget: CycleBudget::DEFAULT,
            frame_rate: 60.0,
            key_hold_ticks: 32,
            autostart: false,
        }
    }
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Config {
            rom: cli.rom.clone(),
            rom_dir: cli.rom_dir.clone(),
            cycle_budget: CycleBudget::new(cli.cycles_per_frame).unwrap_or_default(),
            frame_rate: cli.frame_rate,
            key_hold_ticks: cli.key_hold_ticks,
            autostart: cli.autostart,
        }
    }
}
