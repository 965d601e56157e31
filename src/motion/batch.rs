//! Motor primitives and the batch submitted to the robot

use std::fmt;
use std::str::FromStr;

/// Output port on the brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPort {
    A,
    B,
    C,
    D,
}

impl OutputPort {
    /// Port bit used by the brick's output opcodes
    pub fn mask(self) -> u8 {
        match self {
            OutputPort::A => 0x01,
            OutputPort::B => 0x02,
            OutputPort::C => 0x04,
            OutputPort::D => 0x08,
        }
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputPort::A => "A",
            OutputPort::B => "B",
            OutputPort::C => "C",
            OutputPort::D => "D",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OutputPort::A),
            "B" => Ok(OutputPort::B),
            "C" => Ok(OutputPort::C),
            "D" => Ok(OutputPort::D),
            other => Err(format!("Unknown output port: {}", other)),
        }
    }
}

/// Direction a motor turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Forward,
    Backward,
}

impl Polarity {
    pub fn opposite(self) -> Self {
        match self {
            Polarity::Forward => Polarity::Backward,
            Polarity::Backward => Polarity::Forward,
        }
    }
}

/// How the motor controller regulates a step profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Regulated speed, holds the rate under load
    Speed,
    /// Raw power, used for in-place pivots
    Power,
}

/// One motor instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorPrimitive {
    pub port: OutputPort,
    pub polarity: Polarity,
    pub mode: StepMode,
    /// Speed or power percentage (0-100)
    pub level: u8,
    /// Tacho steps (degrees of motor rotation) to run
    pub magnitude: u32,
    /// Brake at the end of the profile instead of coasting
    pub ramp_down: bool,
}

/// Ordered primitives for one command, submitted as a single unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotorBatch {
    primitives: Vec<MotorPrimitive>,
}

impl MotorBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, primitive: MotorPrimitive) {
        self.primitives.push(primitive);
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn primitives(&self) -> &[MotorPrimitive] {
        &self.primitives
    }
}
