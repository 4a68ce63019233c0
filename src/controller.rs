//! # execution control
//!
//! Run state and cycle batching. The host calls [`ExecutionController::tick`]
//! once per display refresh; while running, each tick executes a fixed
//! [`CycleBudget`] of cycles and renders once at the end of the batch. There
//! is no wall-clock drift correction: a tick does the same amount of work no
//! matter how long it has been since the last one.

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::display::Surface;
use crate::error::CommandError;
use crate::machine::Machine;
use crate::render::RenderTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Running => write!(f, "running"),
        }
    }
}

/// cycles executed per tick while running. at 60 ticks a second the default
/// of 10 approximates a 600Hz CPU; adjust to taste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleBudget(NonZeroU32);

impl CycleBudget {
    pub const DEFAULT: CycleBudget = CycleBudget(match NonZeroU32::new(10) {
        Some(n) => n,
        None => unreachable!(),
    });

    pub fn new(cycles: u32) -> Option<Self> {
        NonZeroU32::new(cycles).map(CycleBudget)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for CycleBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// what a tick (or a step) did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// not running; nothing executed
    Idle,
    /// every cycle succeeded and a frame was rendered
    Rendered { cycles: u32 },
    /// the machine faulted after `completed` good cycles. no frame rendered
    Faulted { completed: u32 },
}

/// told about every run state transition
pub trait RunStateObserver {
    fn run_state_changed(&mut self, previous: RunState, current: RunState);
}

/// logs transitions
pub struct LogObserver;

impl RunStateObserver for LogObserver {
    fn run_state_changed(&mut self, previous: RunState, current: RunState) {
        log::info!("run state: {} -> {}", previous, current);
    }
}

#[derive(Debug, Default)]
struct Status {
    state: RunState,
    note: Option<String>,
    changed: bool,
}

/// shared view of the run state, plus an optional note (load progress, load
/// failure, fault), for whatever is drawing the UI. remembers whether
/// anything changed since the UI last asked
#[derive(Debug, Clone, Default)]
pub struct StatusIndicator(Rc<RefCell<Status>>);

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> RunState {
        self.0.borrow().state
    }

    pub fn note(&self) -> Option<String> {
        self.0.borrow().note.clone()
    }

    pub fn set_note(&self, note: impl Into<String>) {
        let mut status = self.0.borrow_mut();
        status.note = Some(note.into());
        status.changed = true;
    }

    pub fn clear_note(&self) {
        let mut status = self.0.borrow_mut();
        if status.note.take().is_some() {
            status.changed = true;
        }
    }

    /// e.g. "CHIP-8 [stopped] loading PONG2"
    pub fn title(&self) -> String {
        let status = self.0.borrow();
        match &status.note {
            Some(note) => format!("CHIP-8 [{}] {}", status.state, note),
            None => format!("CHIP-8 [{}]", status.state),
        }
    }

    /// true if anything changed since the last call
    pub fn take_changed(&self) -> bool {
        std::mem::take(&mut self.0.borrow_mut().changed)
    }
}

impl RunStateObserver for StatusIndicator {
    fn run_state_changed(&mut self, _previous: RunState, current: RunState) {
        let mut status = self.0.borrow_mut();
        status.state = current;
        status.changed = true;
    }
}

pub struct ExecutionController {
    state: RunState,
    budget: CycleBudget,
    loaded: bool,
    faulted: bool,
    observers: Vec<Box<dyn RunStateObserver>>,
}

impl ExecutionController {
    pub fn new(budget: CycleBudget) -> Self {
        ExecutionController {
            state: RunState::Stopped,
            budget,
            loaded: false,
            faulted: false,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn budget(&self) -> CycleBudget {
        self.budget
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn subscribe(&mut self, observer: Box<dyn RunStateObserver>) {
        self.observers.push(observer);
    }

    /// the program is in the machine; start and step are allowed from now on
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn start(&mut self) -> Result<(), CommandError> {
        self.check_runnable()?;
        match self.state {
            RunState::Running => Err(CommandError::AlreadyRunning),
            RunState::Stopped => {
                self.transition(RunState::Running);
                Ok(())
            }
        }
    }

    /// takes effect from the next tick; a batch never gets cut short by stop
    pub fn stop(&mut self) -> Result<(), CommandError> {
        match self.state {
            RunState::Stopped => Err(CommandError::NotRunning),
            RunState::Running => {
                self.transition(RunState::Stopped);
                Ok(())
            }
        }
    }

    /// execute exactly one cycle right now, rendering if it succeeded. the run
    /// state is left alone unless the cycle faults
    pub fn step<M: Machine, S: Surface>(
        &mut self,
        machine: &mut M,
        render: &mut RenderTrigger<S>,
    ) -> Result<TickOutcome, CommandError> {
        if self.state == RunState::Running {
            return Err(CommandError::StepWhileRunning);
        }
        self.check_runnable()?;
        Ok(self.run_batch(1, machine, render))
    }

    /// called once per display refresh
    pub fn tick<M: Machine, S: Surface>(
        &mut self,
        machine: &mut M,
        render: &mut RenderTrigger<S>,
    ) -> TickOutcome {
        match self.state {
            RunState::Stopped => TickOutcome::Idle,
            RunState::Running => self.run_batch(self.budget.get(), machine, render),
        }
    }

    fn run_batch<M: Machine, S: Surface>(
        &mut self,
        cycles: u32,
        machine: &mut M,
        render: &mut RenderTrigger<S>,
    ) -> TickOutcome {
        for completed in 0..cycles {
            if !machine.execute_cycle() {
                log::error!("machine faulted after {} cycle(s) of {}", completed, cycles);
                self.faulted = true;
                if self.state != RunState::Stopped {
                    self.transition(RunState::Stopped);
                }
                return TickOutcome::Faulted { completed };
            }
        }
        render.fire(machine);
        TickOutcome::Rendered { cycles }
    }

    fn check_runnable(&self) -> Result<(), CommandError> {
        if !self.loaded {
            Err(CommandError::NotLoaded)
        } else if self.faulted {
            Err(CommandError::Faulted)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, next: RunState) {
        let previous = std::mem::replace(&mut self.state, next);
        for observer in self.observers.iter_mut() {
            observer.run_state_changed(previous, next);
        }
    }
}
