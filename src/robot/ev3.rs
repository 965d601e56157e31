//! EV3 direct-command encoding
//!
//! Every command sent to the brick is one frame:
//! ```text
//! [ u16 LE: length of the rest ][ u16 LE: message counter ][ u8: command type ]
//! [ u16 LE: variable allocation ][ bytecodes... ]
//! ```
//!
//! A whole motor batch becomes a single frame, which the brick executes as a
//! unit.

use super::traits::{LinkError, Tone};
use crate::motion::{MotorBatch, MotorPrimitive, Polarity, StepMode};
use bytes::{BufMut, Bytes, BytesMut};

/// Largest frame the brick accepts
pub const MAX_FRAME_SIZE: usize = 1024;

/// Bytecode opcodes used by the agent
pub mod opcode {
    pub const OUTPUT_POLARITY: u8 = 0xA7;
    pub const OUTPUT_STEP_POWER: u8 = 0xAC;
    pub const OUTPUT_STEP_SPEED: u8 = 0xAE;
    pub const SOUND: u8 = 0x94;
    pub const SOUND_TONE: u8 = 0x01;
}

/// Header marker for parameter constants (LC1, LC2, LC4)
const LC1: u8 = 0x81;
const LC2: u8 = 0x82;
const LC4: u8 = 0x83;

/// Brick layer addressed by output opcodes (0 = this brick)
const LAYER: i32 = 0;

/// Direct command reply mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    DirectReply = 0x00,
    DirectNoReply = 0x80,
}

/// A direct command under construction
#[derive(Debug, Clone)]
pub struct DirectCommand {
    kind: CommandType,
    bytecode: BytesMut,
}

impl DirectCommand {
    pub fn new(kind: CommandType) -> Self {
        Self {
            kind,
            bytecode: BytesMut::with_capacity(64),
        }
    }

    /// One frame carrying every primitive of a batch
    ///
    /// Polarities are set first so both motors start their profiles together.
    pub fn from_batch(batch: &MotorBatch) -> Self {
        let mut cmd = Self::new(CommandType::DirectNoReply);
        for primitive in batch.primitives() {
            cmd.set_polarity(primitive.port.mask(), primitive.polarity);
        }
        for primitive in batch.primitives() {
            cmd.step(primitive);
        }
        cmd
    }

    /// Frame playing a tone on the brick speaker
    pub fn tone(tone: Tone) -> Self {
        let mut cmd = Self::new(CommandType::DirectNoReply);
        cmd.bytecode.put_u8(opcode::SOUND);
        cmd.bytecode.put_u8(opcode::SOUND_TONE);
        cmd.param(tone.volume as i32);
        cmd.param(tone.frequency_hz as i32);
        cmd.param(tone.duration_ms as i32);
        cmd
    }

    pub fn set_polarity(&mut self, ports: u8, polarity: Polarity) {
        self.bytecode.put_u8(opcode::OUTPUT_POLARITY);
        self.param(LAYER);
        self.param(ports as i32);
        self.param(match polarity {
            Polarity::Forward => 1,
            Polarity::Backward => -1,
        });
    }

    /// Step profile: no ramp up, `magnitude` constant steps, no ramp down
    pub fn step(&mut self, primitive: &MotorPrimitive) {
        let op = match primitive.mode {
            StepMode::Speed => opcode::OUTPUT_STEP_SPEED,
            StepMode::Power => opcode::OUTPUT_STEP_POWER,
        };
        let steps = i32::try_from(primitive.magnitude).unwrap_or(i32::MAX);

        self.bytecode.put_u8(op);
        self.param(LAYER);
        self.param(primitive.port.mask() as i32);
        self.param(primitive.level.min(100) as i32);
        self.param(0);
        self.param(steps);
        self.param(0);
        self.param(primitive.ramp_down as i32);
    }

    /// Append a constant parameter using the shortest encoding
    fn param(&mut self, value: i32) {
        if (-31..=31).contains(&value) {
            // LC0: 6-bit two's complement in a single byte
            self.bytecode.put_u8((value & 0x3F) as u8);
        } else if let Ok(v) = i8::try_from(value) {
            self.bytecode.put_u8(LC1);
            self.bytecode.put_i8(v);
        } else if let Ok(v) = i16::try_from(value) {
            self.bytecode.put_u8(LC2);
            self.bytecode.put_i16_le(v);
        } else {
            self.bytecode.put_u8(LC4);
            self.bytecode.put_i32_le(value);
        }
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Frame the command with its length prefix and message counter
    pub fn encode(&self, counter: u16) -> Result<Bytes, LinkError> {
        // counter + type + allocation
        let body_len = 2 + 1 + 2 + self.bytecode.len();
        let total_len = 2 + body_len;

        if total_len > MAX_FRAME_SIZE {
            return Err(LinkError::FrameTooLarge(total_len));
        }

        let mut buf = BytesMut::with_capacity(total_len);
        buf.put_u16_le(body_len as u16);
        buf.put_u16_le(counter);
        buf.put_u8(self.kind as u8);
        // No global or local variables
        buf.put_u16_le(0);
        buf.extend_from_slice(&self.bytecode);

        Ok(buf.freeze())
    }
}
