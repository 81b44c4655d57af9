use std::io::Read;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::display::Framebuffer;
use crate::error::Chip8Error;

pub type Timer = u8;
pub type Address = u16;

pub const MEM_SIZE: usize = 4096;
pub const FONT_ADDR: Address = 0x50;
pub const FONT_HEIGHT: usize = 5;
pub const PC_START_ADDR: Address = 0x200;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_DEPTH: usize = 16;
pub const DEFAULT_FRAME_RATE: u64 = 60;
pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u64 = 700;

const FONT_SET: [u8; 16 * FONT_HEIGHT] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// 4 KiB of byte-addressed memory. Addresses wrap modulo `MEM_SIZE`, so
/// index-relative spans running past 0xFFF continue at 0x000.
pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            let font_start = usize::from(FONT_ADDR);
            data[font_start..font_start + FONT_SET.len()].copy_from_slice(&FONT_SET);
            data
        };

        Memory { data }
    }

    fn offset(addr: Address) -> usize {
        usize::from(addr) % MEM_SIZE
    }

    pub fn read(&self, addr: Address) -> u8 {
        self.data[Self::offset(addr)]
    }

    pub fn write(&mut self, addr: Address, value: u8) {
        self.data[Self::offset(addr)] = value;
    }

    /// Copies `rom` verbatim to `PC_START_ADDR`. Oversized images are rejected
    /// before any byte is written.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let start = usize::from(PC_START_ADDR);
        let max = MEM_SIZE - start;
        if rom.len() > max {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max,
            });
        }
        self.data[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    /// Reads `rows` consecutive bytes starting at `index`, wrapping at the end
    /// of memory.
    pub fn read_sprite(&self, index: Address, rows: u8) -> Vec<u8> {
        (0..u16::from(rows))
            .map(|row| self.read(index.wrapping_add(row)))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    /// Only the low nibble selects the register.
    pub fn from_nibble(value: u8) -> Self {
        Self::ALL[usize::from(value & 0x0F)]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    /// Writes the carry/borrow/collision flag. Always a full overwrite.
    pub fn set_flag(&mut self, set: bool) {
        self.write(Register::VF, u8::from(set));
    }

    pub fn as_slice(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed 16-slot return address stack.
pub struct CallStack {
    slots: [Address; STACK_DEPTH],
    pointer: usize,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            slots: [0; STACK_DEPTH],
            pointer: 0,
        }
    }

    /// Pushes `return_addr`. A full stack is left untouched. `pc` is only used
    /// to report the fault.
    pub fn push(&mut self, return_addr: Address, pc: Address) -> Result<(), Chip8Error> {
        if self.pointer == STACK_DEPTH {
            return Err(Chip8Error::StackOverflow { pc });
        }
        self.slots[self.pointer] = return_addr;
        self.pointer += 1;
        Ok(())
    }

    pub fn pop(&mut self, pc: Address) -> Result<Address, Chip8Error> {
        if self.pointer == 0 {
            return Err(Chip8Error::StackUnderflow { pc });
        }
        self.pointer -= 1;
        Ok(self.slots[self.pointer])
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn slots(&self) -> &[Address; STACK_DEPTH] {
        &self.slots
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}
impl Key {
    pub const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
    ];

    /// Register values above 0xF select the key named by their low nibble.
    pub fn from_nibble(value: u8) -> Key {
        Self::ALL[usize::from(value & 0x0F)]
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

pub struct Keypad {
    keys: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [false; NUM_KEYS],
        }
    }

    pub fn press_key(&mut self, key: Key) {
        self.keys[usize::from(key.code())] = true;
    }

    pub fn release_key(&mut self, key: Key) {
        self.keys[usize::from(key.code())] = false;
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.keys[usize::from(key.code())]
    }

    /// Lowest-numbered key currently held down.
    pub fn first_pressed(&self) -> Option<Key> {
        Key::ALL.into_iter().find(|&key| self.is_key_pressed(key))
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate driven by `Fx0A`. While not `Running` the driver keeps ticking timers
/// but fetches nothing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyWait {
    #[default]
    Running,
    AwaitingPress,
    AwaitingRelease,
}
impl KeyWait {
    pub fn is_blocked(self) -> bool {
        self != KeyWait::Running
    }
}

/// Behaviour of `8xy6`/`8xyE`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ShiftQuirk {
    /// Copy Vy into Vx, then shift Vx (COSMAC VIP).
    #[default]
    LoadVy,
    /// Shift Vx in place and ignore Vy (CHIP-48 / SUPER-CHIP).
    InPlace,
}

pub struct Settings {
    pub frame_rate: u64,
    pub ips: u64,
    pub shift_quirk: ShiftQuirk,
    pub seed: Option<u64>,
}
impl Settings {
    pub fn new(frame_rate: u64, ips: u64, shift_quirk: ShiftQuirk, seed: Option<u64>) -> Self {
        Settings {
            frame_rate,
            ips,
            shift_quirk,
            seed,
        }
    }

    /// Instruction cycles executed per timer tick. Never zero.
    pub fn cycles_per_tick(&self) -> u64 {
        (self.ips / self.frame_rate.max(1)).max(1)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(
            DEFAULT_FRAME_RATE,
            DEFAULT_INSTRUCTIONS_PER_SECOND,
            ShiftQuirk::default(),
            None,
        )
    }
}

pub struct Chip8State {
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub delay_timer: Timer,
    pub sound_timer: Timer,
    pub display: Framebuffer,
    /// Set by every handler that touches the display. Only the consumer clears it.
    pub redraw: bool,
    pub keypad: Keypad,
    pub key_wait: KeyWait,
    pub shift_quirk: ShiftQuirk,
    pub rng: StdRng,
}
impl Chip8State {
    pub fn new(settings: &Settings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Chip8State {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            display: Framebuffer::new(),
            redraw: false,
            keypad: Keypad::new(),
            key_wait: KeyWait::Running,
            shift_quirk: settings.shift_quirk,
            rng,
        }
    }

    /// Reads the whole of `reader` into memory at `PC_START_ADDR` and points
    /// the program counter there. Returns the number of bytes loaded.
    pub fn load_rom<R: Read>(&mut self, mut reader: R) -> Result<usize, Chip8Error> {
        let mut rom = Vec::new();
        reader.read_to_end(&mut rom)?;
        self.memory.load_rom(&rom)?;
        self.pc = PC_START_ADDR;
        Ok(rom.len())
    }

    pub fn clear_display(&mut self) {
        self.display.clear();
        self.redraw = true;
    }

    /// XORs the `rows`-byte sprite at the index register onto the display at
    /// (`x`, `y`). Returns true if any lit pixel was turned off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, rows: u8) -> bool {
        let sprite = self.memory.read_sprite(self.index, rows);
        let collision = self.display.draw_sprite(usize::from(x), usize::from(y), &sprite);
        self.redraw = true;
        collision
    }

    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Chip8State {
        Chip8State::new(&Settings {
            seed: Some(7),
            ..Settings::default()
        })
    }

    #[test]
    fn font_is_loaded_at_construction() {
        let memory = Memory::new();
        let base = FONT_ADDR;
        assert_eq!(memory.read(base), 0xF0);
        assert_eq!(memory.read(base + 5), 0x20);
        assert_eq!(memory.read(base + 5 * 0xF + 4), 0x80);
    }

    #[test]
    fn memory_outside_font_is_zero() {
        let memory = Memory::new();
        let font = usize::from(FONT_ADDR)..usize::from(FONT_ADDR) + FONT_SET.len();
        for addr in 0..MEM_SIZE {
            if !font.contains(&addr) {
                assert_eq!(memory.read(addr as Address), 0, "addr {addr:#05X}");
            }
        }
    }

    #[test]
    fn memory_wraps_past_last_address() {
        let mut memory = Memory::new();
        memory.write(0x1000, 0xAB);
        assert_eq!(memory.read(0x000), 0xAB);
        memory.write(0xFFF, 0x11);
        assert_eq!(memory.read_sprite(0xFFF, 2), vec![0x11, 0xAB]);
    }

    #[test]
    fn rom_is_copied_to_program_start() {
        let mut state = state();
        state.pc = 0x300;
        let loaded = state.load_rom(&[0x12, 0x34, 0x56][..]).unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(state.pc, PC_START_ADDR);
        assert_eq!(state.memory.read(0x200), 0x12);
        assert_eq!(state.memory.read(0x202), 0x56);
        assert_eq!(state.memory.read(0x203), 0x00);
    }

    #[test]
    fn oversized_rom_is_rejected() {
        let mut state = state();
        let rom = vec![0xFF; MEM_SIZE - usize::from(PC_START_ADDR) + 1];
        let err = state.load_rom(rom.as_slice()).unwrap_err();
        assert!(matches!(err, Chip8Error::RomTooLarge { size: 3585, max: 3584 }));
        assert_eq!(state.memory.read(0x200), 0);
    }

    #[test]
    fn unreadable_rom_is_an_io_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk on fire"))
            }
        }

        let mut state = state();
        let err = state.load_rom(Broken).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn call_stack_overflow_leaves_stack_untouched() {
        let mut stack = CallStack::new();
        for i in 0..STACK_DEPTH as Address {
            stack.push(0x200 + i * 2, 0).unwrap();
        }
        let before = *stack.slots();
        let err = stack.push(0xABC, 0x300).unwrap_err();
        assert!(matches!(err, Chip8Error::StackOverflow { pc: 0x300 }));
        assert_eq!(stack.pointer(), STACK_DEPTH);
        assert_eq!(*stack.slots(), before);
    }

    #[test]
    fn call_stack_underflow() {
        let mut stack = CallStack::new();
        assert!(matches!(
            stack.pop(0x204),
            Err(Chip8Error::StackUnderflow { pc: 0x204 })
        ));
        assert_eq!(stack.pointer(), 0);
    }

    #[test]
    fn keypad_reports_lowest_pressed_key() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.first_pressed(), None);
        keypad.press_key(Key::KeyB);
        keypad.press_key(Key::Key3);
        assert_eq!(keypad.first_pressed(), Some(Key::Key3));
        keypad.release_key(Key::Key3);
        assert_eq!(keypad.first_pressed(), Some(Key::KeyB));
    }

    #[test]
    fn cycles_per_tick_never_zero() {
        assert_eq!(Settings::default().cycles_per_tick(), 11);
        assert_eq!(Settings::new(60, 10, ShiftQuirk::LoadVy, None).cycles_per_tick(), 1);
        assert_eq!(Settings::new(0, 10, ShiftQuirk::LoadVy, None).cycles_per_tick(), 10);
    }
}
