//! Dispatch loop draining the command queue into the robot

mod runner;

pub use runner::{DispatchLoop, LoopConfig, LoopState, LoopStats, StepOutcome};
