use std::fmt::Debug;

use log::debug;
use rand::Rng;

use crate::decode::DecodedInstruction;
use crate::error::Chip8Error;
use crate::state::{Address, Chip8State, FONT_ADDR, FONT_HEIGHT, Key, KeyWait, Register, ShiftQuirk};

/// A single opcode's state transition. Handlers run after the driver has
/// already moved the program counter past the instruction.
pub trait Instruction: Debug {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error>;
}

/// Address of the instruction currently executing.
fn current_addr(state: &Chip8State) -> Address {
    state.pc.wrapping_sub(2)
}

fn skip_if(state: &mut Chip8State, condition: bool) {
    if condition {
        state.pc = state.pc.wrapping_add(2);
    }
}

#[derive(Debug)]
pub struct ClearScreen;
impl Instruction for ClearScreen {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.clear_display();
        Ok(())
    }
}

#[derive(Debug)]
pub struct SubroutineReturn;
impl Instruction for SubroutineReturn {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.pc = state.stack.pop(current_addr(state))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Jump(pub DecodedInstruction);
impl Instruction for Jump {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.pc = self.0.nnn;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SubroutineCall(pub DecodedInstruction);
impl Instruction for SubroutineCall {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        // pc already points past the call, which is the return address
        let addr = current_addr(state);
        state.stack.push(state.pc, addr)?;
        state.pc = self.0.nnn;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SkipEqX(pub DecodedInstruction);
impl Instruction for SkipEqX {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        skip_if(state, value_x == self.0.kk);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SkipNeqX(pub DecodedInstruction);
impl Instruction for SkipNeqX {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        skip_if(state, value_x != self.0.kk);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SkipXEqY(pub DecodedInstruction);
impl Instruction for SkipXEqY {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let equal = state.registers.read(self.0.x) == state.registers.read(self.0.y);
        skip_if(state, equal);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SkipXNeqY(pub DecodedInstruction);
impl Instruction for SkipXNeqY {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let equal = state.registers.read(self.0.x) == state.registers.read(self.0.y);
        skip_if(state, !equal);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetImmediate(pub DecodedInstruction);
impl Instruction for SetImmediate {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.registers.write(self.0.x, self.0.kk);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Add(pub DecodedInstruction);
impl Instruction for Add {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        state.registers.write(self.0.x, value_x.wrapping_add(self.0.kk));
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetXToY(pub DecodedInstruction);
impl Instruction for SetXToY {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_y = state.registers.read(self.0.y);
        state.registers.write(self.0.x, value_y);
        Ok(())
    }
}

// In the 8xyN handlers below, VF is always written last so that the flag
// survives when x is F. Flags are computed from the operands before any write.

#[derive(Debug)]
pub struct BinaryOr(pub DecodedInstruction);
impl Instruction for BinaryOr {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);

        state.registers.write(self.0.x, value_x | value_y);
        state.registers.set_flag(false);
        Ok(())
    }
}

#[derive(Debug)]
pub struct BinaryAnd(pub DecodedInstruction);
impl Instruction for BinaryAnd {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);

        state.registers.write(self.0.x, value_x & value_y);
        state.registers.set_flag(false);
        Ok(())
    }
}

#[derive(Debug)]
pub struct LogicalXor(pub DecodedInstruction);
impl Instruction for LogicalXor {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);

        state.registers.write(self.0.x, value_x ^ value_y);
        state.registers.set_flag(false);
        Ok(())
    }
}

#[derive(Debug)]
pub struct BinaryAdd(pub DecodedInstruction);
impl Instruction for BinaryAdd {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        let (sum, carry) = value_x.overflowing_add(value_y);

        state.registers.write(self.0.x, sum);
        state.registers.set_flag(carry);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SubtractYFromX(pub DecodedInstruction);
impl Instruction for SubtractYFromX {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        let no_borrow = value_x >= value_y;

        state.registers.write(self.0.x, value_x.wrapping_sub(value_y));
        state.registers.set_flag(no_borrow);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SubtractXFromY(pub DecodedInstruction);
impl Instruction for SubtractXFromY {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        let no_borrow = value_y >= value_x;

        state.registers.write(self.0.x, value_y.wrapping_sub(value_x));
        state.registers.set_flag(no_borrow);
        Ok(())
    }
}

/// Operand of a shift: Vy copied into Vx, or Vx itself, depending on the quirk.
fn shift_source(state: &Chip8State, decoded: &DecodedInstruction) -> u8 {
    match state.shift_quirk {
        ShiftQuirk::LoadVy => state.registers.read(decoded.y),
        ShiftQuirk::InPlace => state.registers.read(decoded.x),
    }
}

#[derive(Debug)]
pub struct RightShift(pub DecodedInstruction);
impl Instruction for RightShift {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value = shift_source(state, &self.0);

        state.registers.write(self.0.x, value >> 1);
        state.registers.set_flag(value & 0x01 == 0x01);
        Ok(())
    }
}

#[derive(Debug)]
pub struct LeftShift(pub DecodedInstruction);
impl Instruction for LeftShift {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value = shift_source(state, &self.0);

        state.registers.write(self.0.x, value << 1);
        state.registers.set_flag(value & 0x80 == 0x80);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetIndex(pub DecodedInstruction);
impl Instruction for SetIndex {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.index = self.0.nnn;
        Ok(())
    }
}

#[derive(Debug)]
pub struct JumpWithOffset(pub DecodedInstruction);
impl Instruction for JumpWithOffset {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.pc = Address::from(state.registers.read(Register::V0)) + self.0.nnn;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Random(pub DecodedInstruction);
impl Instruction for Random {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let random_value = state.rng.random::<u8>() & self.0.kk;
        state.registers.write(self.0.x, random_value);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Display(pub DecodedInstruction);
impl Instruction for Display {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let x = state.registers.read(self.0.x);
        let y = state.registers.read(self.0.y);

        let collision = state.draw_sprite(x, y, self.0.n);
        state.registers.set_flag(collision);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SkipIfKeyPressed(pub DecodedInstruction);
impl Instruction for SkipIfKeyPressed {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let key = Key::from_nibble(state.registers.read(self.0.x));
        let pressed = state.keypad.is_key_pressed(key);
        skip_if(state, pressed);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SkipIfKeyNotPressed(pub DecodedInstruction);
impl Instruction for SkipIfKeyNotPressed {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let key = Key::from_nibble(state.registers.read(self.0.x));
        let pressed = state.keypad.is_key_pressed(key);
        skip_if(state, !pressed);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetVxFromTimer(pub DecodedInstruction);
impl Instruction for SetVxFromTimer {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.registers.write(self.0.x, state.delay_timer);
        Ok(())
    }
}

/// `Fx0A`. Takes the lowest pressed key and then waits for its release. With
/// nothing pressed the instruction is rewound so it runs again once the gate
/// opens.
#[derive(Debug)]
pub struct GetKey(pub DecodedInstruction);
impl Instruction for GetKey {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        match state.keypad.first_pressed() {
            Some(key) => {
                state.registers.write(self.0.x, key.code());
                state.key_wait = KeyWait::AwaitingRelease;
                debug!("key {:X} captured into {:?}, awaiting release", key.code(), self.0.x);
            }
            None => {
                state.pc = current_addr(state);
                state.key_wait = KeyWait::AwaitingPress;
                debug!("no key held at {:#05X}, awaiting press", state.pc);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetDelayTimer(pub DecodedInstruction);
impl Instruction for SetDelayTimer {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.delay_timer = state.registers.read(self.0.x);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetSoundTimer(pub DecodedInstruction);
impl Instruction for SetSoundTimer {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        state.sound_timer = state.registers.read(self.0.x);
        Ok(())
    }
}

#[derive(Debug)]
pub struct AddToIndex(pub DecodedInstruction);
impl Instruction for AddToIndex {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        state.index = state.index.wrapping_add(Address::from(value_x));
        Ok(())
    }
}

#[derive(Debug)]
pub struct FontChar(pub DecodedInstruction);
impl Instruction for FontChar {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = Address::from(state.registers.read(self.0.x));
        state.index = FONT_ADDR + value_x * FONT_HEIGHT as Address;
        Ok(())
    }
}

#[derive(Debug)]
pub struct BinaryCodedDecimal(pub DecodedInstruction);
impl Instruction for BinaryCodedDecimal {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
        for (offset, digit) in (0..).zip(bcd) {
            state.memory.write(state.index.wrapping_add(offset), digit);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Store(pub DecodedInstruction);
impl Instruction for Store {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let registers = &Register::ALL[..=self.0.x.index()];
        for (offset, &reg) in (0..).zip(registers) {
            let value = state.registers.read(reg);
            state.memory.write(state.index.wrapping_add(offset), value);
        }
        state.index = state.index.wrapping_add(registers.len() as Address);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Load(pub DecodedInstruction);
impl Instruction for Load {
    fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        let registers = &Register::ALL[..=self.0.x.index()];
        for (offset, &reg) in (0..).zip(registers) {
            let value = state.memory.read(state.index.wrapping_add(offset));
            state.registers.write(reg, value);
        }
        state.index = state.index.wrapping_add(registers.len() as Address);
        Ok(())
    }
}
