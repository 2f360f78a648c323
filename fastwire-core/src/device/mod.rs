//! Client-side API
//!
//! An [`I2cDevice`] stands for one slave on the bus. Drivers build a list
//! of read/write commands and launch them against a [`Future`], which then
//! carries the transaction result:
//!
//! ```ignore
//! let device = I2cDevice::new(&manager, 0x77)?;
//! let mut future: Future<'_, u8, u8> = Future::new(0x35);
//! device.launch_commands(
//!     &mut future,
//!     &[I2cDevice::write(0, I2cFinish::empty()), I2cDevice::read(0, I2cFinish::empty())],
//! )?;
//! future.wait();
//! let value = future.get();
//! ```

mod blocking;
mod group;
mod registers;

pub use blocking::BlockingI2c;
pub use group::{FuturesGroup, GroupMember, GroupSteps, RegisterWrites};
pub use registers::{ReadRegisterFuture, WriteRegisterFuture};

use crate::command::{validate_commands, I2cFinish, LightCommand};
use crate::errors::I2cError;
use crate::future::{Future, FutureStatus, Payload, MAX_PAYLOAD_SIZE};
use crate::manager::{CommandSink, Launch};

/// Lowest 7-bit address available to devices (0x00-0x07 are reserved)
pub const MIN_ADDRESS: u8 = 0x08;
/// Highest 7-bit address available to devices (0x78-0x7F are reserved)
pub const MAX_ADDRESS: u8 = 0x77;

/// Check a 7-bit address and shift it into SLA position
pub(crate) fn shifted_address(address: u8) -> Result<u8, I2cError> {
    if (MIN_ADDRESS..=MAX_ADDRESS).contains(&address) {
        Ok(address << 1)
    } else {
        Err(I2cError::Invalid)
    }
}

/// One I2C slave
#[derive(Clone, Copy)]
pub struct I2cDevice<'m> {
    sink: &'m dyn CommandSink,
    /// Address shifted left by one
    target: u8,
}

impl<'m> I2cDevice<'m> {
    /// Device at 7-bit `address` on the bus driven by `sink`
    pub fn new(sink: &'m dyn CommandSink, address: u8) -> Result<Self, I2cError> {
        Ok(Self {
            sink,
            target: shifted_address(address)?,
        })
    }

    /// 7-bit device address
    pub fn address(&self) -> u8 {
        self.target >> 1
    }

    /// Change the device address, e.g. for chips with a configurable one
    pub fn set_device(&mut self, address: u8) -> Result<(), I2cError> {
        self.target = shifted_address(address)?;
        Ok(())
    }

    /// Read command; `count` 0 reads the whole Future output
    pub const fn read(count: u8, finish: I2cFinish) -> LightCommand {
        LightCommand::read(count, finish)
    }

    /// Write command; `count` 0 writes the whole Future input
    pub const fn write(count: u8, finish: I2cFinish) -> LightCommand {
        LightCommand::write(count, finish)
    }

    /// Queue `commands` as one transaction whose result goes to `future`
    ///
    /// Read byte counts must add up to the Future output size and write
    /// byte counts to its input size. A Future can be launched again only
    /// after [`Future::reset_`].
    ///
    /// # Errors
    ///
    /// - [`I2cError::Invalid`]: no command, sizes do not match, or the
    ///   Future was already launched and not re-armed
    /// - [`I2cError::Again`]: no free Future slot or not enough queue room
    /// - [`I2cError::Busy`]: the Future is still in flight
    ///
    /// Nothing is queued or registered when an error is returned.
    pub fn launch_commands<OUT: Payload, IN: Payload>(
        &self,
        future: &mut Future<'m, OUT, IN>,
        commands: &[LightCommand],
    ) -> Result<(), I2cError> {
        validate_commands(commands, IN::SIZE, OUT::SIZE)?;

        let store = self.sink.futures();
        let rearmed = match future.binding() {
            Some((id, bound)) if core::ptr::addr_eq(bound, store) => Some(id),
            Some(_) => return Err(I2cError::Invalid),
            None => None,
        };

        let mut raw = [0u8; MAX_PAYLOAD_SIZE];
        let len = future.encode_input(&mut raw);
        let id = self.sink.launch(Launch {
            target: self.target,
            rearmed,
            input: &raw[..len],
            output_size: OUT::SIZE,
            commands,
        })?;
        if rearmed.is_none() {
            future.bind(id, store);
        }
        Ok(())
    }
}

impl core::fmt::Debug for I2cDevice<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("I2cDevice")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Wait for `future` and turn its final state into a `Result`
pub fn wait_result<OUT: Payload, IN: Payload>(future: &Future<'_, OUT, IN>) -> Result<OUT, I2cError> {
    match future.wait() {
        FutureStatus::Ready => future.get().ok_or(I2cError::Invalid),
        _ => Err(future.error().unwrap_or(I2cError::Invalid)),
    }
}
