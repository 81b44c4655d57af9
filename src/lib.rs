//! A CHIP-8 interpreter core: processor state, opcode decoding and the cycle
//! driver. Presentation, audio and input live in the binary.

pub mod chip8;
pub mod decode;
pub mod display;
pub mod error;
pub mod instruction;
pub mod state;

pub use chip8::Chip8;
pub use error::{Chip8Error, ErrorKind};
pub use state::{Key, KeyWait, Settings, ShiftQuirk};
