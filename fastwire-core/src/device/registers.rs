//! Register access helpers
//!
//! Most I2C devices expose their state as registers: a write of the
//! register address, then a read (or a write) of its content.

use super::{wait_result, I2cDevice};
use crate::command::I2cFinish;
use crate::errors::I2cError;
use crate::future::{Future, Payload};

/// Future for reading a register of type `T`; its input is the register
/// address
pub type ReadRegisterFuture<'m, T> = Future<'m, T, u8>;

/// Future for writing `T` to a register; its input is the register address
/// followed by the value
pub type WriteRegisterFuture<'m, T> = Future<'m, (), (u8, T)>;

impl<'m> I2cDevice<'m> {
    /// Launch a register read: write the address, then read with a
    /// repeated START
    pub fn read_register<T: Payload>(
        &self,
        future: &mut ReadRegisterFuture<'m, T>,
    ) -> Result<(), I2cError> {
        self.launch_commands(
            future,
            &[
                Self::write(0, I2cFinish::empty()),
                Self::read(0, I2cFinish::empty()),
            ],
        )
    }

    /// Launch a register write: address and value in a single write
    pub fn write_register<T: Payload>(
        &self,
        future: &mut WriteRegisterFuture<'m, T>,
    ) -> Result<(), I2cError> {
        self.launch_commands(future, &[Self::write(0, I2cFinish::empty())])
    }

    /// Read `register` and wait for its value
    pub fn sync_read_register<T: Payload>(&self, register: u8) -> Result<T, I2cError> {
        let mut future = ReadRegisterFuture::<T>::new(register);
        self.read_register(&mut future)?;
        wait_result(&future)
    }

    /// Write `value` to `register` and wait for the write to complete
    pub fn sync_write_register<T: Payload>(&self, register: u8, value: T) -> Result<(), I2cError> {
        let mut future = WriteRegisterFuture::new((register, value));
        self.write_register(&mut future)?;
        wait_result(&future)
    }
}
