//! Asynchronous I2C transaction engine
//!
//! Interrupt-driven I2C master for TWI peripherals (ATmega style):
//!
//! - [`future`]: Future handles, the slot registry behind them and their
//!   typed payloads
//! - [`command`]: read/write commands and the bounded command queue
//! - [`stepper`]: the protocol state machine run from the TWI interrupt
//! - [`manager`]: [`I2cManager`], tying the above to a [`TwiHardware`]
//! - [`device`]: the client API ([`I2cDevice`]), register helpers, Future
//!   groups and an `embedded-hal` adapter
//! - [`observer`]: debug and callback hooks
//!
//! Transactions are queued from the foreground and executed one bus phase
//! per interrupt; results are delivered through [`Future`]s that client
//! code polls or waits on.
//!
//! [`TwiHardware`]: fastwire_hal::TwiHardware

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod device;
pub mod errors;
pub mod future;
pub mod manager;
pub mod observer;
pub mod stepper;


pub use command::{I2cFinish, LightCommand};
pub use config::{ErrorPolicy, ExecutionMode, ManagerConfig};
pub use device::{
    BlockingI2c, FuturesGroup, GroupMember, GroupSteps, I2cDevice, ReadRegisterFuture,
    RegisterWrites, WriteRegisterFuture,
};
pub use errors::I2cError;
pub use future::{Future, FutureId, FutureListener, FutureStatus, Payload};
pub use manager::{CommandSink, I2cManager};
pub use observer::{DebugRecorder, I2cCallback, I2cObserver, LatestStatus, NoObserver};
