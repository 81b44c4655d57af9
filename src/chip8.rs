use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info, trace};

use crate::decode::decode;
use crate::display::Framebuffer;
use crate::error::Chip8Error;
use crate::state::{Chip8State, Key, KeyWait, Settings};

/// # Chip-8
///
/// Owns the processor state and drives it one fetch-decode-execute cycle at a
/// time. The frame loop calls [`Chip8::execute_cycle`] `cycles_per_tick` times
/// per 1/60 s; the delay and sound timers drop by one on the first cycle of
/// every tick.
///
/// Collaborators see the framebuffer, the redraw flag and the beep flag read
/// only, and feed the keypad through [`Chip8::key_down`] / [`Chip8::key_up`].
pub struct Chip8 {
    state: Chip8State,
    cycles_per_tick: u64,
    cycles_until_tick: u64,
}

impl Chip8 {
    pub fn new(settings: &Settings) -> Self {
        Chip8 {
            state: Chip8State::new(settings),
            cycles_per_tick: settings.cycles_per_tick(),
            cycles_until_tick: 0,
        }
    }

    /// Load a ROM image from any byte source.
    pub fn load_rom<R: Read>(&mut self, reader: R) -> Result<usize, Chip8Error> {
        let size = self.state.load_rom(reader)?;
        info!("loaded {size} byte ROM at {:#05X}", self.state.pc);
        Ok(size)
    }

    pub fn load_rom_file(&mut self, path: &Path) -> Result<usize, Chip8Error> {
        let file = File::open(path)?;
        self.load_rom(BufReader::new(file))
    }

    /// Runs one cycle.
    ///
    /// Timers tick first. While a key wait is pending nothing is fetched.
    /// Otherwise the instruction at the program counter is fetched, the
    /// counter is advanced by two and the handler is run. A failing handler
    /// leaves the program counter on the faulting instruction.
    pub fn execute_cycle(&mut self) -> Result<(), Chip8Error> {
        self.tick_timers();

        if self.state.key_wait.is_blocked() {
            return Ok(());
        }

        let addr = self.state.pc;
        let b1 = self.state.memory.read(addr);
        let b2 = self.state.memory.read(addr.wrapping_add(1));
        self.state.pc = addr.wrapping_add(2);

        let result = decode(b1, b2).and_then(|instruction| {
            trace!("{addr:#05X}: {b1:02X}{b2:02X} {instruction:?}");
            instruction.execute(&mut self.state)
        });
        if result.is_err() {
            self.state.pc = addr;
        }
        result
    }

    fn tick_timers(&mut self) {
        if self.cycles_until_tick > 0 {
            self.cycles_until_tick -= 1;
            return;
        }
        self.cycles_until_tick = self.cycles_per_tick - 1;

        self.state.delay_timer = self.state.delay_timer.saturating_sub(1);
        self.state.sound_timer = self.state.sound_timer.saturating_sub(1);
    }

    /// A key went down. Opens the gate if `Fx0A` is waiting for a press.
    pub fn key_down(&mut self, key: Key) {
        self.state.keypad.press_key(key);
        if self.state.key_wait == KeyWait::AwaitingPress {
            debug!("key {:X} pressed, resuming", key.code());
            self.state.key_wait = KeyWait::Running;
        }
    }

    /// A key went up. Opens the gate if `Fx0A` is waiting for a release.
    pub fn key_up(&mut self, key: Key) {
        self.state.keypad.release_key(key);
        if self.state.key_wait == KeyWait::AwaitingRelease {
            debug!("key {:X} released, resuming", key.code());
            self.state.key_wait = KeyWait::Running;
        }
    }

    pub fn key_wait(&self) -> KeyWait {
        self.state.key_wait
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.state.display
    }

    pub fn needs_redraw(&self) -> bool {
        self.state.redraw
    }

    pub fn clear_redraw(&mut self) {
        self.state.redraw = false;
    }

    pub fn should_beep(&self) -> bool {
        self.state.should_beep()
    }

    pub fn state(&self) -> &Chip8State {
        &self.state
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
