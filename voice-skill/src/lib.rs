//! Voice skill endpoint for the EV3 relay
//!
//! Receives platform requests, translates them into robot commands, and
//! publishes each command to the queue the agent drains.

pub mod config;
pub mod envelope;
pub mod handler;
pub mod publisher;
pub mod session;

pub use envelope::{RequestEnvelope, Turn};
pub use handler::{SkillHandler, SkillReply};
pub use publisher::{CommandPublisher, PublishError, SqsPublisher};
