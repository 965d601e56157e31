//! Motion planning for the differential drive
//!
//! This module handles:
//! - Motor primitives and the batches submitted to the robot
//! - Mapping canonical commands to batches
//! - Submitting a batch through the robot link

mod batch;
mod dispatcher;

pub use batch::{MotorBatch, MotorPrimitive, OutputPort, Polarity, StepMode};
pub use dispatcher::{drive, DispatchError, DispatchOutcome, DriveConfig, MotionDispatcher};
