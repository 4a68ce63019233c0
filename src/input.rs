use crossterm::event::{
    poll, read, Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

use crate::keypad::{KeyEdge, KeyEvent};

/// control commands from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Command(Command),
    Quit,
}

/// reads whatever the user has done since the last call
pub trait Input {
    /// called once per tick; must not block
    fn read_events(&mut self) -> Result<Vec<InputEvent>, io::Error>;
}

/// turns a terminal event into something the session understands
pub fn translate(event: &Event) -> Option<InputEvent> {
    let key = match event {
        Event::Key(key) => key,
        _ => return None,
    };
    let is_release = key.kind == KeyEventKind::Release;
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            (!is_release).then_some(InputEvent::Quit)
        }
        KeyCode::Char(c) if is_release => Some(InputEvent::Key(KeyEvent::released(c))),
        KeyCode::Char(c) => Some(InputEvent::Key(KeyEvent::pressed(c))),
        _ if is_release => None,
        KeyCode::Esc => Some(InputEvent::Quit),
        KeyCode::F(5) => Some(InputEvent::Command(Command::Start)),
        KeyCode::F(6) => Some(InputEvent::Command(Command::Stop)),
        KeyCode::F(10) => Some(InputEvent::Command(Command::Step)),
        _ => None,
    }
}

/// most terminals never say when a key goes up. until one does, a key counts
/// as released once it has gone hold_ticks ticks without a press or repeat
struct HeldKeys {
    hold_ticks: u32,
    held: HashMap<char, u32>,
    releases_reported: bool,
}

impl HeldKeys {
    fn new(hold_ticks: u32) -> Self {
        HeldKeys {
            hold_ticks,
            held: HashMap::new(),
            releases_reported: false,
        }
    }

    fn observe(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Key(KeyEvent {
                key,
                edge: KeyEdge::Pressed,
            }) => {
                if !self.releases_reported && self.hold_ticks > 0 {
                    self.held.insert(*key, self.hold_ticks);
                }
            }
            InputEvent::Key(KeyEvent { .. }) => {
                if !self.releases_reported {
                    log::debug!("terminal reports key releases; no longer synthesising them");
                    self.releases_reported = true;
                    self.held.clear();
                }
            }
            _ => {}
        }
    }

    /// count down a tick and release anything that ran out
    fn expire(&mut self) -> Vec<InputEvent> {
        let mut expired = Vec::new();
        self.held.retain(|key, left| {
            *left -= 1;
            if *left == 0 {
                expired.push(InputEvent::Key(KeyEvent::released(*key)));
                false
            } else {
                true
            }
        });
        expired
    }
}

/// keyboard input from the terminal, via crossterm
pub struct TerminalInput {
    held: HeldKeys,
}

impl TerminalInput {
    pub fn new(hold_ticks: u32) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        // ask for release events; terminals that can't oblige just ignore this
        let _ = execute!(
            io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );
        Ok(TerminalInput {
            held: HeldKeys::new(hold_ticks),
        })
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for TerminalInput {
    fn read_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        let mut events = Vec::new();
        while poll(Duration::from_millis(0))? {
            let event = read()?;
            match translate(&event) {
                Some(e) => {
                    self.held.observe(&e);
                    events.push(e);
                }
                None => log::trace!("ignoring terminal event {:?}", event),
            }
        }
        events.extend(self.held.expire());
        Ok(events)
    }
}

/// dummy Input implementation for testing; hands out one scripted batch per
/// call and asks to quit once the script runs out
pub struct DummyInput {
    batches: VecDeque<Vec<InputEvent>>,
}

impl DummyInput {
    pub fn new(batches: Vec<Vec<InputEvent>>) -> Self {
        DummyInput {
            batches: batches.into(),
        }
    }
}

impl Input for DummyInput {
    fn read_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        Ok(self
            .batches
            .pop_front()
            .unwrap_or_else(|| vec![InputEvent::Quit]))
    }
}
