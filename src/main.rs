use clap::Parser;
use std::error::Error;

use chip8_driver::controller::StatusIndicator;
use chip8_driver::display::{MonoTermDisplay, Surface, CHIP8_HEIGHT, CHIP8_WIDTH};
use chip8_driver::input::TerminalInput;
use chip8_driver::rom::RomDirectory;
use chip8_driver::test_card::TestCardMachine;
use chip8_driver::{Cli, Config, Session};

fn main() -> Result<(), Box<dyn Error>> {
    // stderr shares the terminal with the display, so stay quiet unless asked.
    // anything the user needs to see goes in the display title instead
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    let cli = Cli::parse();
    let config = Config::from(&cli);

    // initialise
    let status = StatusIndicator::new();
    let machine = TestCardMachine::new(cli.halt_after);
    let mut display = MonoTermDisplay::new(CHIP8_WIDTH, CHIP8_HEIGHT)?.with_status(status.clone());
    display.draw(&machine.compose())?;
    let mut input = TerminalInput::new(config.key_hold_ticks)?;

    let mut session = Session::new(machine, display, &config).with_status(status);

    // load a program, then hand over to the frame loop
    session.load(RomDirectory::new(&config.rom_dir), &config.rom)?;
    session.run(&mut input, config.frame_rate)?;
    Ok(())
}
