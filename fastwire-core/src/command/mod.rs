//! I2C commands
//!
//! A transaction is a list of read and write commands against one device,
//! all feeding the same Future. Client code builds [`LightCommand`]s (kind,
//! byte count, [`I2cFinish`] flags); the manager turns them into full
//! [`Command`]s stamped with the device address and Future ID when they are
//! queued.

mod queue;

pub use queue::CommandQueue;

use bitflags::bitflags;

use crate::errors::I2cError;
use crate::future::FutureId;

/// Direction of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// Placeholder, never executed
    #[default]
    None,
    /// Receive bytes from the device into the Future's output
    Read,
    /// Transmit bytes from the Future's input to the device
    Write,
}

bitflags! {
    /// What to do once a command has been executed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct I2cFinish: u8 {
        /// Issue a STOP after this command even if more commands are queued
        const FORCE_STOP = 0x01;
        /// Complete the Future after this command, not only at the end of
        /// the transaction
        const FUTURE_FINISH = 0x02;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for I2cFinish {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "I2cFinish({=u8:#x})", self.bits());
    }
}

/// Command as built by client code, before it is bound to a device and a
/// Future
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightCommand {
    pub kind: CommandKind,
    /// Bytes to transfer; 0 means the whole Future output (read) or input
    /// (write)
    pub byte_count: u8,
    pub finish: I2cFinish,
}

impl LightCommand {
    pub const fn read(byte_count: u8, finish: I2cFinish) -> Self {
        Self {
            kind: CommandKind::Read,
            byte_count,
            finish,
        }
    }

    pub const fn write(byte_count: u8, finish: I2cFinish) -> Self {
        Self {
            kind: CommandKind::Write,
            byte_count,
            finish,
        }
    }
}

/// Byte count of `command` with 0 resolved to the whole Future input
/// (write) or output (read)
pub fn resolved_count(command: &LightCommand, input_size: usize, output_size: usize) -> u8 {
    let whole = match command.kind {
        CommandKind::Read => output_size,
        CommandKind::Write => input_size,
        CommandKind::None => 0,
    };
    match command.byte_count {
        0 => u8::try_from(whole).unwrap_or(u8::MAX),
        count => count,
    }
}

/// Check that `commands` transfer exactly the Future's input and output
///
/// Reads must move at least one byte: the last byte of a read is what the
/// master NACKs to release SDA, so an empty read cannot end cleanly.
pub fn validate_commands(
    commands: &[LightCommand],
    input_size: usize,
    output_size: usize,
) -> Result<(), I2cError> {
    if commands.is_empty() {
        return Err(I2cError::Invalid);
    }
    let mut total_write = 0usize;
    let mut total_read = 0usize;
    for command in commands {
        let count = usize::from(resolved_count(command, input_size, output_size));
        match command.kind {
            CommandKind::Read if count == 0 => return Err(I2cError::Invalid),
            CommandKind::Read => total_read += count,
            CommandKind::Write => total_write += count,
            CommandKind::None => return Err(I2cError::Invalid),
        }
    }
    if total_write != input_size || total_read != output_size {
        return Err(I2cError::Invalid);
    }
    Ok(())
}

/// Queued command
///
/// Immutable once queued; the stepper keeps its own byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub kind: CommandKind,
    /// 7-bit device address shifted left by one (R/W bit cleared)
    pub target: u8,
    /// Resolved number of bytes to transfer
    pub byte_count: u8,
    /// STOP after this command, then START for the next one
    pub force_stop: bool,
    /// Complete the Future once this command is done
    pub finish_future: bool,
    /// Last command of its transaction
    pub end_transaction: bool,
    pub future_id: FutureId,
}

impl Command {
    pub fn is_read(&self) -> bool {
        self.kind == CommandKind::Read
    }

    pub fn is_write(&self) -> bool {
        self.kind == CommandKind::Write
    }

    /// Address byte to send: SLA+R for reads, SLA+W otherwise
    pub fn address_byte(&self) -> u8 {
        if self.is_read() {
            self.target | 0x01
        } else {
            self.target
        }
    }
}
