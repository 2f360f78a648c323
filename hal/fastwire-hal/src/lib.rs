//! Fastwire Hardware Abstraction Layer
//!
//! This crate defines the contract between the I2C transaction engine and
//! the TWI peripheral it drives. Chip-specific crates (or the host
//! simulator) implement [`twi::TwiHardware`]; the engine in `fastwire-core`
//! only ever talks to the bus through it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Device drivers / application           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  fastwire-core (queue, stepper, futures)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  fastwire-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  ATmega TWI   │       │ fastwire-hal- │
//! │  registers    │       │     sim       │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Contents
//!
//! - [`twi::TwiHardware`] - one-phase-at-a-time TWI bus primitives
//! - [`twi::TwiStatus`] - TWI status register vocabulary
//! - [`i2c::I2cMode`], [`i2c::I2cConfig`] - bus speed and timing

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;
pub mod twi;

// Re-export key types at crate root for convenience
pub use i2c::{I2cConfig, I2cMode};
pub use twi::{TwiHardware, TwiStatus};
