use crate::state::Address;

/// The three classes of failure a run can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The ROM could not be read or does not fit in memory.
    Io,
    /// A secondary dispatch value has no handler.
    InvalidOpcode,
    /// The interpreter reached a state it cannot continue from.
    Internal,
}

/// Errors raised while loading or executing a program. All of them are
/// terminal for the run.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("failed to read ROM: {0}")]
    Io(#[from] std::io::Error),

    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error("invalid opcode {opcode:#06X}")]
    InvalidOpcode { opcode: u16 },

    #[error("call stack overflow at {pc:#05X}")]
    StackOverflow { pc: Address },

    #[error("call stack underflow at {pc:#05X}")]
    StackUnderflow { pc: Address },
}

impl Chip8Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Chip8Error::Io(_) | Chip8Error::RomTooLarge { .. } => ErrorKind::Io,
            Chip8Error::InvalidOpcode { .. } => ErrorKind::InvalidOpcode,
            Chip8Error::StackOverflow { .. } | Chip8Error::StackUnderflow { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        let io = Chip8Error::from(std::io::Error::other("gone"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(
            Chip8Error::RomTooLarge { size: 5000, max: 3584 }.kind(),
            ErrorKind::Io
        );
        assert_eq!(
            Chip8Error::InvalidOpcode { opcode: 0xE0FF }.kind(),
            ErrorKind::InvalidOpcode
        );
        assert_eq!(
            Chip8Error::StackOverflow { pc: 0x200 }.kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            Chip8Error::StackUnderflow { pc: 0x200 }.kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn messages_format_opcodes_in_hex() {
        let err = Chip8Error::InvalidOpcode { opcode: 0x8AB9 };
        assert_eq!(err.to_string(), "invalid opcode 0x8AB9");
    }
}
