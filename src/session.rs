use spin_sleep::LoopHelper;
use std::io;

use crate::config::Config;
use crate::controller::{
    ExecutionController, LogObserver, RunState, RunStateObserver, StatusIndicator, TickOutcome,
};
use crate::display::Surface;
use crate::error::{CommandError, LoadError};
use crate::input::{Command, Input, InputEvent};
use crate::keypad::{KeyEdge, KeyEvent, KeyMapper, KeypadState};
use crate::machine::Machine;
use crate::render::RenderTrigger;
use crate::rom::{RomLoader, RomSource};

/// one run of one ROM on one machine. everything happens on the caller's
/// thread: input between ticks, cycles and rendering inside them
pub struct Session<M: Machine, S: Surface> {
    machine: M,
    controller: ExecutionController,
    render: RenderTrigger<S>,
    loader: RomLoader,
    mapper: KeyMapper,
    // the only state shared between the input side and the machine side
    keypad: KeypadState,
    autostart: bool,
    status: Option<StatusIndicator>,
    load_error: Option<LoadError>,
}

impl<M: Machine, S: Surface> Session<M, S> {
    pub fn new(mut machine: M, surface: S, config: &Config) -> Self {
        machine.initialize();
        let mut controller = ExecutionController::new(config.cycle_budget);
        controller.subscribe(Box::new(LogObserver));
        Session {
            machine,
            controller,
            render: RenderTrigger::new(surface),
            loader: RomLoader::new(),
            mapper: KeyMapper::new(),
            keypad: KeypadState::new(),
            autostart: config.autostart,
            status: None,
            load_error: None,
        }
    }

    /// keep status up to date with the run state, load progress and faults
    pub fn with_status(mut self, status: StatusIndicator) -> Self {
        self.subscribe(Box::new(status.clone()));
        self.status = Some(status);
        self
    }

    pub fn subscribe(&mut self, observer: Box<dyn RunStateObserver>) {
        self.controller.subscribe(observer);
    }

    /// begin fetching the session's ROM. completion is picked up by tick()
    pub fn load(&mut self, source: impl RomSource, name: &str) -> Result<(), CommandError> {
        self.loader.begin(source, name)?;
        if let Some(status) = &self.status {
            status.set_note(format!("loading {}", name));
        }
        Ok(())
    }

    /// block until the ROM fetch finishes; true if the program made it in
    pub fn wait_for_load(&mut self) -> bool {
        match self.loader.wait(&mut self.machine) {
            Some(result) => self.finish_load(result),
            None => self.controller.is_loaded(),
        }
    }

    fn finish_load(&mut self, result: Result<(), LoadError>) -> bool {
        match result {
            Ok(()) => {
                if let Some(status) = &self.status {
                    status.clear_note();
                }
                self.controller.mark_loaded();
                if self.autostart {
                    self.command(Command::Start);
                }
                true
            }
            Err(e) => {
                log::error!("{}", e);
                if let Some(status) = &self.status {
                    status.set_note(e.to_string());
                }
                self.load_error = Some(e);
                false
            }
        }
    }

    /// one display refresh
    pub fn tick(&mut self) -> TickOutcome {
        if let Some(result) = self.loader.poll(&mut self.machine) {
            self.finish_load(result);
        }
        let outcome = self.controller.tick(&mut self.machine, &mut self.render);
        self.note_fault(outcome);
        if let Err(e) = self.render.refresh() {
            log::warn!("couldn't refresh the display: {}", e);
        }
        outcome
    }

    fn note_fault(&self, outcome: TickOutcome) {
        if let (TickOutcome::Faulted { .. }, Some(status)) = (outcome, &self.status) {
            status.set_note(CommandError::Faulted.to_string());
        }
    }

    /// update the keypad and pass real changes on to the machine
    pub fn handle_key(&mut self, event: KeyEvent) {
        let key = match self.mapper.map(event.key) {
            Some(key) => key,
            None => {
                log::trace!("{:?} isn't on the keypad", event.key);
                return;
            }
        };
        if self.keypad.apply(key, event.edge) {
            match event.edge {
                KeyEdge::Pressed => self.machine.set_key_down(key),
                KeyEdge::Released => self.machine.set_key_up(key),
            }
        }
    }

    /// refused commands are logged and otherwise ignored
    pub fn command(&mut self, command: Command) -> Option<TickOutcome> {
        let result = match command {
            Command::Start => self.controller.start().map(|_| None),
            Command::Stop => self.controller.stop().map(|_| None),
            Command::Step => self
                .controller
                .step(&mut self.machine, &mut self.render)
                .map(Some),
        };
        match result {
            Ok(outcome) => {
                if let Some(outcome) = outcome {
                    self.note_fault(outcome);
                }
                outcome
            }
            Err(e) => {
                log::warn!("ignoring {:?}: {}", command, e);
                None
            }
        }
    }

    /// false once the user has asked to quit
    pub fn handle(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Key(key) => self.handle_key(key),
            InputEvent::Command(command) => {
                self.command(command);
            }
            InputEvent::Quit => return false,
        }
        true
    }

    /// tick at frame_rate until the input asks to quit. ticks carry on while
    /// stopped, they just don't do anything
    pub fn run(&mut self, input: &mut impl Input, frame_rate: f64) -> Result<(), io::Error> {
        let mut pacer = LoopHelper::builder().build_with_target_rate(frame_rate);
        loop {
            pacer.loop_start();
            for event in input.read_events()? {
                if !self.handle(event) {
                    return Ok(());
                }
            }
            self.tick();
            pacer.loop_sleep();
        }
    }

    pub fn state(&self) -> RunState {
        self.controller.state()
    }

    pub fn is_loaded(&self) -> bool {
        self.controller.is_loaded()
    }

    /// true while the ROM fetch is still in flight
    pub fn is_loading(&self) -> bool {
        self.loader.is_pending()
    }

    /// why the ROM never made it in, if it didn't
    pub fn load_error(&self) -> Option<&LoadError> {
        self.load_error.as_ref()
    }

    pub fn keypad(&self) -> &KeypadState {
        &self.keypad
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn frames_rendered(&self) -> u64 {
        self.render.frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CycleBudget;
    use crate::display::DummyDisplay;
    use crate::input::DummyInput;
    use crate::keypad::LogicalKey;
    use crate::machine::{Call, DummyMachine};
    use crate::rom::InMemoryRoms;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;

    fn config(cycles: u32) -> Config {
        Config {
            cycle_budget: CycleBudget::new(cycles).unwrap(),
            ..Config::default()
        }
    }

    fn pong() -> InMemoryRoms {
        InMemoryRoms::new().with("PONG2", vec![0x6a; 256])
    }

    fn loaded_session(m: DummyMachine, cycles: u32) -> Session<DummyMachine, DummyDisplay> {
        let mut s = Session::new(m, DummyDisplay::new(), &config(cycles));
        s.load(pong(), "PONG2").unwrap();
        assert!(s.wait_for_load());
        s
    }

    fn key(code: u8) -> LogicalKey {
        LogicalKey::new(code).unwrap()
    }

    /// draws nothing; remembers the title a terminal would be showing
    struct TitleRecorder {
        status: StatusIndicator,
        shown: Option<String>,
    }

    impl Surface for TitleRecorder {
        fn draw(&mut self, _data: &[u8]) -> Result<(), io::Error> {
            self.status.take_changed();
            self.shown = Some(self.status.title());
            Ok(())
        }

        fn get_display_size_bytes(&self) -> usize {
            256
        }

        fn refresh(&mut self) -> Result<(), io::Error> {
            if self.status.take_changed() {
                self.shown = Some(self.status.title());
            }
            Ok(())
        }
    }

    fn titled_session(m: DummyMachine) -> Session<DummyMachine, TitleRecorder> {
        let status = StatusIndicator::new();
        let surface = TitleRecorder {
            status: status.clone(),
            shown: None,
        };
        let mut s = Session::new(m, surface, &config(10)).with_status(status);
        s.load(pong(), "PONG2").unwrap();
        assert!(s.wait_for_load());
        s
    }

    fn shown_title(s: &Session<DummyMachine, TitleRecorder>) -> Option<&str> {
        s.render.surface().shown.as_deref()
    }

    struct GatedSource(Mutex<Receiver<()>>);

    impl RomSource for GatedSource {
        fn fetch(&self, _name: &str) -> Result<Vec<u8>, io::Error> {
            let _ = self.0.lock().unwrap().recv();
            Ok(vec![0; 16])
        }
    }

    #[test]
    fn test_pong_scenario() {
        let mut s = loaded_session(DummyMachine::new(), 10);
        assert_eq!(
            s.machine().calls,
            vec![Call::Initialize, Call::LoadProgram(256)]
        );
        s.command(Command::Start);
        for _ in 0..5 {
            assert_eq!(s.tick(), TickOutcome::Rendered { cycles: 10 });
        }
        assert_eq!(s.machine().count(&Call::ExecuteCycle), 50);
        assert_eq!(s.machine().count(&Call::RenderFrame), 5);
        assert_eq!(s.frames_rendered(), 5);
    }

    #[test]
    fn test_start_waits_for_load() {
        let (open, gate) = mpsc::channel();
        let mut s = Session::new(DummyMachine::new(), DummyDisplay::new(), &config(10));
        s.load(GatedSource(Mutex::new(gate)), "PONG2").unwrap();

        s.command(Command::Start);
        assert!(s.is_loading());
        assert_eq!(s.state(), RunState::Stopped);
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.machine().count(&Call::ExecuteCycle), 0);

        open.send(()).unwrap();
        assert!(s.wait_for_load());
        s.command(Command::Start);
        assert_eq!(s.state(), RunState::Running);
    }

    #[test]
    fn test_tick_picks_up_finished_load() {
        let mut s = Session::new(DummyMachine::new(), DummyDisplay::new(), &config(3));
        s.load(pong(), "PONG2").unwrap();
        // the fetch runs on another thread; keep ticking until it lands
        for _ in 0..10_000 {
            s.tick();
            if s.is_loaded() {
                break;
            }
            std::thread::yield_now();
        }
        assert!(s.is_loaded());
        assert_eq!(s.machine().count(&Call::LoadProgram(256)), 1);
    }

    #[test]
    fn test_autostart() {
        let c = Config {
            autostart: true,
            ..config(2)
        };
        let mut s = Session::new(DummyMachine::new(), DummyDisplay::new(), &c);
        s.load(pong(), "PONG2").unwrap();
        s.wait_for_load();
        assert_eq!(s.state(), RunState::Running);
    }

    #[test]
    fn test_failed_load_never_runs() {
        let c = Config {
            autostart: true,
            ..config(2)
        };
        let mut s = Session::new(DummyMachine::new(), DummyDisplay::new(), &c);
        s.load(InMemoryRoms::new(), "PONG2").unwrap();
        assert!(!s.wait_for_load());
        s.command(Command::Start);
        s.command(Command::Step);
        assert_eq!(s.state(), RunState::Stopped);
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.load(pong(), "PONG2"), Err(CommandError::LoadAlreadyRequested));
    }

    #[test]
    fn test_fault_stops_session() {
        let mut s = loaded_session(DummyMachine::failing_on_cycle(3), 10);
        s.command(Command::Start);
        assert_eq!(s.tick(), TickOutcome::Faulted { completed: 2 });
        assert_eq!(s.state(), RunState::Stopped);
        assert_eq!(s.machine().count(&Call::RenderFrame), 0);
        s.command(Command::Start);
        assert_eq!(s.state(), RunState::Stopped);
    }

    #[test]
    fn test_step_while_stopped() {
        let mut s = loaded_session(DummyMachine::new(), 10);
        assert_eq!(
            s.command(Command::Step),
            Some(TickOutcome::Rendered { cycles: 1 })
        );
        assert_eq!(s.machine().count(&Call::ExecuteCycle), 1);
        assert_eq!(s.machine().count(&Call::RenderFrame), 1);
        assert_eq!(s.state(), RunState::Stopped);

        s.command(Command::Start);
        assert_eq!(s.command(Command::Step), None);
        assert_eq!(s.machine().count(&Call::ExecuteCycle), 1);
    }

    #[test]
    fn test_stop_waits_for_tick_boundary() {
        let mut s = loaded_session(DummyMachine::new(), 4);
        s.command(Command::Start);
        s.tick();
        s.command(Command::Stop);
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.machine().count(&Call::ExecuteCycle), 4);
    }

    #[test]
    fn test_keys_forward_edges_only() {
        let mut s = loaded_session(DummyMachine::new(), 1);
        s.handle_key(KeyEvent::pressed('w'));
        s.handle_key(KeyEvent::pressed('W'));
        s.handle_key(KeyEvent::pressed('w'));
        assert!(s.keypad().is_pressed(key(0x5)));
        s.handle_key(KeyEvent::released('w'));
        s.handle_key(KeyEvent::released('w'));
        assert!(!s.keypad().is_pressed(key(0x5)));

        let keys: Vec<_> = s
            .machine()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::KeyDown(_) | Call::KeyUp(_)))
            .cloned()
            .collect();
        assert_eq!(keys, vec![Call::KeyDown(key(0x5)), Call::KeyUp(key(0x5))]);
    }

    #[test]
    fn test_unmapped_keys_change_nothing() {
        let mut s = loaded_session(DummyMachine::new(), 1);
        let before = s.keypad().clone();
        for k in ['g', 'p', '0', '9', ' ', '\t'] {
            s.handle_key(KeyEvent::pressed(k));
            s.handle_key(KeyEvent::released(k));
        }
        assert_eq!(*s.keypad(), before);
        assert_eq!(s.machine().calls.len(), 2); // initialize, load
    }

    #[test]
    fn test_run_until_quit() -> Result<(), io::Error> {
        let mut s = loaded_session(DummyMachine::new(), 10);
        let mut input = DummyInput::new(vec![
            vec![InputEvent::Command(Command::Start)],
            vec![InputEvent::Key(KeyEvent::pressed('1'))],
            vec![],
            vec![InputEvent::Command(Command::Stop)],
        ]);
        s.run(&mut input, 1000.0)?;
        // the stop lands before the fourth tick; the quit before a fifth
        assert_eq!(s.machine().count(&Call::ExecuteCycle), 30);
        assert_eq!(s.machine().count(&Call::KeyDown(key(0x1))), 1);
        assert_eq!(s.state(), RunState::Stopped);
        Ok(())
    }

    #[test]
    fn test_shown_status_follows_stop() {
        let mut s = titled_session(DummyMachine::new());
        s.command(Command::Start);
        s.tick();
        s.tick();
        assert_eq!(shown_title(&s), Some("CHIP-8 [running]"));

        s.command(Command::Stop);
        for _ in 0..100 {
            assert_eq!(s.tick(), TickOutcome::Idle);
        }
        assert_eq!(shown_title(&s), Some("CHIP-8 [stopped]"));
    }

    #[test]
    fn test_shown_status_follows_fault() {
        let mut s = titled_session(DummyMachine::failing_on_cycle(12));
        s.command(Command::Start);
        assert_eq!(s.tick(), TickOutcome::Rendered { cycles: 10 });
        assert_eq!(shown_title(&s), Some("CHIP-8 [running]"));
        assert_eq!(s.tick(), TickOutcome::Faulted { completed: 1 });

        let title = shown_title(&s).unwrap();
        assert!(title.starts_with("CHIP-8 [stopped]"), "{}", title);
        assert!(title.contains("faulted"), "{}", title);
    }

    #[test]
    fn test_shown_status_after_failed_step() {
        let mut s = titled_session(DummyMachine::failing_on_cycle(1));
        assert_eq!(
            s.command(Command::Step),
            Some(TickOutcome::Faulted { completed: 0 })
        );
        s.tick();
        assert!(shown_title(&s).unwrap().contains("faulted"));
    }

    #[test]
    fn test_load_failure_is_kept_and_shown() {
        let status = StatusIndicator::new();
        let mut s = Session::new(DummyMachine::new(), DummyDisplay::new(), &config(2))
            .with_status(status.clone());
        assert!(s.load_error().is_none());
        s.load(InMemoryRoms::new(), "PONG2").unwrap();
        assert_eq!(status.note().as_deref(), Some("loading PONG2"));

        assert!(!s.wait_for_load());
        assert!(!s.is_loading());
        match s.load_error() {
            Some(LoadError::Fetch { name, .. }) => assert_eq!(name, "PONG2"),
            other => panic!("expected a fetch error, got {:?}", other),
        }
        assert!(status.title().contains("couldn't fetch ROM 'PONG2'"));
        assert_eq!(status.get(), RunState::Stopped);
    }

    #[test]
    fn test_successful_load_clears_loading_note() {
        let status = StatusIndicator::new();
        let mut s = Session::new(DummyMachine::new(), DummyDisplay::new(), &config(2))
            .with_status(status.clone());
        s.load(pong(), "PONG2").unwrap();
        assert!(s.wait_for_load());
        assert!(s.load_error().is_none());
        assert_eq!(status.title(), "CHIP-8 [stopped]");
    }
}
