//! Host simulator for the Fastwire I2C engine
//!
//! Implements [`fastwire_hal::TwiHardware`] on a simulated bus so that the
//! whole engine (queue, stepper, Futures) runs on the host:
//!
//! - [`bus::SimBus`], [`bus::SimTwi`] - the wire and the TWI peripheral
//! - [`slave::SimSlave`], [`slave::RegisterSlave`] - devices on the bus
//! - [`isr`] - an interrupt thread fed by an `embassy-sync` channel, and a
//!   deterministic single-thread driver

#![deny(unsafe_code)]

pub mod bus;
pub mod isr;
pub mod slave;

#[cfg(test)]
mod scenarios;

pub use bus::{BusEvent, SimBus, SimTwi};
pub use isr::{run_isr, run_until_idle, run_until_idle_with, IsrEvent, IsrStats};
pub use slave::{RegisterFile, RegisterSlave, SimSlave};
