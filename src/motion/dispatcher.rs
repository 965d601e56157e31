//! Motion dispatcher - maps canonical commands to motor batches

use super::batch::{MotorBatch, MotorPrimitive, OutputPort, Polarity, StepMode};
use crate::robot::{LinkError, RobotLink};
use ev3_relay_shared::{Action, CanonicalCommand};
use thiserror::Error;
use tracing::{debug, info};

/// Drive geometry defaults
pub mod drive {
    /// Speed/power percentage used for every motion
    pub const DRIVE_LEVEL: u8 = 100;
    /// Distance used when the command carries no usable value
    pub const DEFAULT_DISTANCE: u32 = 30;
    /// Tacho steps per unit of distance
    pub const DISTANCE_SCALE: u32 = 100;
    /// Tacho steps for an in-place pivot
    pub const PIVOT_STEPS: u32 = 180;
}

/// Errors raised while executing a motion
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Robot link failed: {0}")]
    Link(#[from] LinkError),
}

/// Result of dispatching one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Batch accepted by the robot
    Executed { primitives: usize },
    /// Nothing to do for this action
    NoOp,
}

/// Configuration for the differential drive
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub left_port: OutputPort,
    pub right_port: OutputPort,
    pub drive_level: u8,
    pub default_distance: u32,
    pub distance_scale: u32,
    pub pivot_steps: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            left_port: OutputPort::B,
            right_port: OutputPort::C,
            drive_level: drive::DRIVE_LEVEL,
            default_distance: drive::DEFAULT_DISTANCE,
            distance_scale: drive::DISTANCE_SCALE,
            pivot_steps: drive::PIVOT_STEPS,
        }
    }
}

/// Translates commands into motor batches and submits them
#[derive(Debug, Clone, Default)]
pub struct MotionDispatcher {
    config: DriveConfig,
}

impl MotionDispatcher {
    pub fn new(config: DriveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Build the batch for a command without touching the robot
    pub fn plan(&self, command: &CanonicalCommand) -> MotorBatch {
        match command.kind() {
            Action::Forward => self.straight(Polarity::Forward, command.value()),
            Action::Backward => self.straight(Polarity::Backward, command.value()),
            // Left pivots on the spot: left wheel back, right wheel forward
            Action::Left => self.pivot(Polarity::Backward),
            Action::Right => self.pivot(Polarity::Forward),
            Action::Stop | Action::Go | Action::Turn | Action::Other => MotorBatch::new(),
        }
    }

    /// Plan and submit a command, running it to completion
    pub async fn dispatch<L: RobotLink + ?Sized>(
        &self,
        link: &mut L,
        command: &CanonicalCommand,
    ) -> Result<DispatchOutcome, DispatchError> {
        let batch = self.plan(command);
        if batch.is_empty() {
            debug!("[DISPATCH] No motion for '{}'", command);
            return Ok(DispatchOutcome::NoOp);
        }

        link.submit(&batch).await?;
        info!("[DISPATCH] Executed '{}' ({} primitives)", command, batch.len());
        Ok(DispatchOutcome::Executed {
            primitives: batch.len(),
        })
    }

    fn distance(&self, value: Option<&str>) -> u32 {
        value
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(self.config.default_distance)
            .saturating_mul(self.config.distance_scale)
    }

    fn straight(&self, polarity: Polarity, value: Option<&str>) -> MotorBatch {
        let steps = self.distance(value);
        let mut batch = MotorBatch::new();
        for port in [self.config.left_port, self.config.right_port] {
            batch.push(MotorPrimitive {
                port,
                polarity,
                mode: StepMode::Speed,
                level: self.config.drive_level,
                magnitude: steps,
                ramp_down: false,
            });
        }
        batch
    }

    fn pivot(&self, left: Polarity) -> MotorBatch {
        let mut batch = MotorBatch::new();
        for (port, polarity) in [
            (self.config.left_port, left),
            (self.config.right_port, left.opposite()),
        ] {
            batch.push(MotorPrimitive {
                port,
                polarity,
                mode: StepMode::Power,
                level: self.config.drive_level,
                magnitude: self.config.pivot_steps,
                ramp_down: false,
            });
        }
        batch
    }
}
