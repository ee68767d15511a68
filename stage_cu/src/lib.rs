//! # XY Stage Control Unit Library
//!
//! Closed-loop dual-axis trajectory controller for a motorized XY stage.
//! A fixed-rate tick reads the position sensors, runs one PI law per active
//! axis, and walks a waypoint trajectory with settling, axis-lock and
//! locked-axis drift-correction policy. Hardware access goes through the
//! [`hw::StageHardware`] trait; the caller drains an explicit event queue
//! every tick.
//!
//! ## Tick shape
//!
//! stop check → sensor reads (X, then Y, always) → per-axis PI → one
//! hardware command → settle classification → state transitions. The
//! steady-state tick allocates nothing and never blocks on I/O.

pub mod config;
pub mod control;
pub mod cycle;
pub mod exec;
pub mod hw;
pub mod sim;
