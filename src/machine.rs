use crate::display::Surface;
use crate::error::TransferError;
use crate::keypad::LogicalKey;

/// the virtual machine being driven. The driver never looks inside it; these
/// are the only ways in.
pub trait Machine {
    /// reset all machine state. called once, before anything is loaded
    fn initialize(&mut self);

    /// take ownership of a program image and place it at the machine's
    /// program origin (0x200 for a classic layout)
    fn load_program(&mut self, program: Vec<u8>) -> Result<(), TransferError>;

    /// one fetch/decode/execute. false means an unrecoverable fault
    fn execute_cycle(&mut self) -> bool;

    fn set_key_down(&mut self, key: LogicalKey);

    fn set_key_up(&mut self, key: LogicalKey);

    /// paint the display buffer onto the surface
    fn render_frame(&mut self, surface: &mut dyn Surface);

    /// update any auxiliary readout (registers, timers)
    fn refresh_diagnostics(&mut self);
}

/// a call made into a DummyMachine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initialize,
    LoadProgram(usize),
    ExecuteCycle,
    KeyDown(LogicalKey),
    KeyUp(LogicalKey),
    RenderFrame,
    RefreshDiagnostics,
}

/// dummy Machine implementation for testing; records every call and can be
/// told to fault on a given cycle
#[derive(Debug, Default)]
pub struct DummyMachine {
    pub calls: Vec<Call>,
    /// 1-based cycle number that returns false
    pub fail_on_cycle: Option<usize>,
    /// largest program load_program will accept
    pub capacity: Option<usize>,
    cycles: usize,
}

impl DummyMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_cycle(n: usize) -> Self {
        DummyMachine {
            fail_on_cycle: Some(n),
            ..Self::default()
        }
    }

    pub fn with_capacity(max: usize) -> Self {
        DummyMachine {
            capacity: Some(max),
            ..Self::default()
        }
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// cycles that returned true
    pub fn successful_cycles(&self) -> usize {
        match self.fail_on_cycle {
            Some(n) if self.cycles >= n => self.cycles - 1,
            _ => self.cycles,
        }
    }
}

impl Machine for DummyMachine {
    fn initialize(&mut self) {
        self.calls.push(Call::Initialize);
    }

    fn load_program(&mut self, program: Vec<u8>) -> Result<(), TransferError> {
        self.calls.push(Call::LoadProgram(program.len()));
        match self.capacity {
            Some(max) if program.len() > max => Err(TransferError::new(format!(
                "{} bytes won't fit in {}",
                program.len(),
                max
            ))),
            _ => Ok(()),
        }
    }

    fn execute_cycle(&mut self) -> bool {
        self.calls.push(Call::ExecuteCycle);
        self.cycles += 1;
        self.fail_on_cycle != Some(self.cycles)
    }

    fn set_key_down(&mut self, key: LogicalKey) {
        self.calls.push(Call::KeyDown(key));
    }

    fn set_key_up(&mut self, key: LogicalKey) {
        self.calls.push(Call::KeyUp(key));
    }

    fn render_frame(&mut self, surface: &mut dyn Surface) {
        self.calls.push(Call::RenderFrame);
        let blank = vec![0; surface.get_display_size_bytes()];
        if let Err(e) = surface.draw(&blank) {
            log::error!("DummyMachine couldn't draw: {}", e);
        }
    }

    fn refresh_diagnostics(&mut self) {
        self.calls.push(Call::RefreshDiagnostics);
    }
}
