use crate::error::Chip8Error;
use crate::instruction::{
    Add, AddToIndex, BinaryAdd, BinaryAnd, BinaryCodedDecimal, BinaryOr, ClearScreen, Display,
    FontChar, GetKey, Instruction, Jump, JumpWithOffset, LeftShift, Load, LogicalXor, Random,
    RightShift, SetDelayTimer, SetImmediate, SetIndex, SetSoundTimer, SetVxFromTimer, SetXToY,
    SkipEqX, SkipIfKeyNotPressed, SkipIfKeyPressed, SkipNeqX, SkipXEqY, SkipXNeqY, Store,
    SubroutineCall, SubroutineReturn, SubtractXFromY, SubtractYFromX,
};
use crate::state::{Address, Register};

/// Operand fields of a raw instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// The full 16-bit instruction, kept for error reporting.
    pub raw: u16,
    /// First nibble. Selects the opcode family.
    pub opcode: u8,
    /// Second nibble.
    pub x: Register,
    /// Third nibble.
    pub y: Register,
    /// Fourth nibble.
    pub n: u8,
    /// Second byte.
    pub kk: u8,
    /// Low 12 bits. An address.
    pub nnn: Address,
}
impl DecodedInstruction {
    pub fn new(b1: u8, b2: u8) -> Self {
        let raw = u16::from_be_bytes([b1, b2]);
        DecodedInstruction {
            raw,
            opcode: b1 >> 4,
            x: Register::from_nibble(b1),
            y: Register::from_nibble(b2 >> 4),
            n: b2 & 0x0F,
            kk: b2,
            nnn: raw & 0x0FFF,
        }
    }
}

/// The sixteen opcode families, one per value of the high nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpcodeFamily {
    /// `00E0`, `00EE`
    System,
    Jump,
    Call,
    SkipEqImmediate,
    SkipNeqImmediate,
    SkipEqRegister,
    LoadImmediate,
    AddImmediate,
    /// `8xyN`, keyed on the low nibble.
    Arithmetic,
    SkipNeqRegister,
    LoadIndex,
    JumpWithOffset,
    Random,
    Draw,
    /// `Ex9E`, `ExA1`
    Keyboard,
    /// `FxNN`, keyed on the second byte.
    Misc,
}

const FAMILIES: [OpcodeFamily; 16] = [
    OpcodeFamily::System,
    OpcodeFamily::Jump,
    OpcodeFamily::Call,
    OpcodeFamily::SkipEqImmediate,
    OpcodeFamily::SkipNeqImmediate,
    OpcodeFamily::SkipEqRegister,
    OpcodeFamily::LoadImmediate,
    OpcodeFamily::AddImmediate,
    OpcodeFamily::Arithmetic,
    OpcodeFamily::SkipNeqRegister,
    OpcodeFamily::LoadIndex,
    OpcodeFamily::JumpWithOffset,
    OpcodeFamily::Random,
    OpcodeFamily::Draw,
    OpcodeFamily::Keyboard,
    OpcodeFamily::Misc,
];

impl OpcodeFamily {
    pub fn of(b1: u8) -> Self {
        FAMILIES[usize::from(b1 >> 4)]
    }
}

/// Turns the byte pair at the program counter into an executable handler.
/// Families with a secondary dispatch fail with `InvalidOpcode` when the
/// secondary code is unknown.
pub fn decode(b1: u8, b2: u8) -> Result<Box<dyn Instruction>, Chip8Error> {
    let decoded = DecodedInstruction::new(b1, b2);
    let invalid = || Chip8Error::InvalidOpcode {
        opcode: decoded.raw,
    };

    match OpcodeFamily::of(b1) {
        OpcodeFamily::System => match decoded.nnn {
            0x0E0 => Ok(Box::new(ClearScreen)),
            0x0EE => Ok(Box::new(SubroutineReturn)),
            _ => Err(invalid()),
        },
        OpcodeFamily::Jump => Ok(Box::new(Jump(decoded))),
        OpcodeFamily::Call => Ok(Box::new(SubroutineCall(decoded))),
        OpcodeFamily::SkipEqImmediate => Ok(Box::new(SkipEqX(decoded))),
        OpcodeFamily::SkipNeqImmediate => Ok(Box::new(SkipNeqX(decoded))),
        OpcodeFamily::SkipEqRegister => Ok(Box::new(SkipXEqY(decoded))),
        OpcodeFamily::LoadImmediate => Ok(Box::new(SetImmediate(decoded))),
        OpcodeFamily::AddImmediate => Ok(Box::new(Add(decoded))),
        OpcodeFamily::Arithmetic => match decoded.n {
            0x0 => Ok(Box::new(SetXToY(decoded))),
            0x1 => Ok(Box::new(BinaryOr(decoded))),
            0x2 => Ok(Box::new(BinaryAnd(decoded))),
            0x3 => Ok(Box::new(LogicalXor(decoded))),
            0x4 => Ok(Box::new(BinaryAdd(decoded))),
            0x5 => Ok(Box::new(SubtractYFromX(decoded))),
            0x6 => Ok(Box::new(RightShift(decoded))),
            0x7 => Ok(Box::new(SubtractXFromY(decoded))),
            0xE => Ok(Box::new(LeftShift(decoded))),
            _ => Err(invalid()),
        },
        OpcodeFamily::SkipNeqRegister => Ok(Box::new(SkipXNeqY(decoded))),
        OpcodeFamily::LoadIndex => Ok(Box::new(SetIndex(decoded))),
        OpcodeFamily::JumpWithOffset => Ok(Box::new(JumpWithOffset(decoded))),
        OpcodeFamily::Random => Ok(Box::new(Random(decoded))),
        OpcodeFamily::Draw => Ok(Box::new(Display(decoded))),
        OpcodeFamily::Keyboard => match decoded.kk {
            0x9E => Ok(Box::new(SkipIfKeyPressed(decoded))),
            0xA1 => Ok(Box::new(SkipIfKeyNotPressed(decoded))),
            _ => Err(invalid()),
        },
        OpcodeFamily::Misc => match decoded.kk {
            0x07 => Ok(Box::new(SetVxFromTimer(decoded))),
            0x0A => Ok(Box::new(GetKey(decoded))),
            0x15 => Ok(Box::new(SetDelayTimer(decoded))),
            0x18 => Ok(Box::new(SetSoundTimer(decoded))),
            0x1E => Ok(Box::new(AddToIndex(decoded))),
            0x29 => Ok(Box::new(FontChar(decoded))),
            0x33 => Ok(Box::new(BinaryCodedDecimal(decoded))),
            0x55 => Ok(Box::new(Store(decoded))),
            0x65 => Ok(Box::new(Load(decoded))),
            _ => Err(invalid()),
        },
    }
}
