use std::io;

use crate::display::Surface;
use crate::machine::Machine;

/// hands the surface to the machine after a batch of cycles has gone through
pub struct RenderTrigger<S: Surface> {
    surface: S,
    frames: u64,
}

impl<S: Surface> RenderTrigger<S> {
    pub fn new(surface: S) -> Self {
        RenderTrigger { surface, frames: 0 }
    }

    /// paint the display buffer, then the diagnostics; in that order
    pub fn fire(&mut self, machine: &mut impl Machine) {
        machine.render_frame(&mut self.surface);
        machine.refresh_diagnostics();
        self.frames += 1;
    }

    /// let the surface catch up on anything besides the frame itself
    pub fn refresh(&mut self) -> Result<(), io::Error> {
        self.surface.refresh()
    }

    /// number of times the trigger has fired
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
