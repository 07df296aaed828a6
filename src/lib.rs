//! Pose-driven controller events for assistive remote play.
//!
//! ```text
//! sense:  PoseSource ──► gesture ──► pipe::PipeProducer ──┐
//!                                                         │ named pipe
//! relay:  controller::ControllerForwarder ◄── pipe::PipeConsumer ◄──┘
//! ```
//!
//! The two sides run as separate processes and share nothing but the pipe.

pub mod controller;
pub mod gesture;
pub mod persistence;
pub mod pipe;
pub mod sensor;
