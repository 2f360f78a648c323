//! Error codes
//!
//! Precondition failures are returned synchronously by
//! [`I2cDevice::launch_commands`](crate::device::I2cDevice::launch_commands);
//! bus failures are stored in the affected Future and surface through
//! [`Future::error`](crate::future::Future::error).

use core::fmt;

use fastwire_hal::TwiStatus;

/// errno value: resource temporarily unavailable
pub const EAGAIN: i16 = -11;
/// errno value: device or resource busy
pub const EBUSY: i16 = -16;
/// errno value: invalid argument
pub const EINVAL: i16 = -22;
/// errno value: timer expired
pub const ETIME: i16 = -62;
/// errno value: protocol error
pub const EPROTO: i16 = -71;
/// errno value: illegal byte sequence
pub const EILSEQ: i16 = -84;
/// errno value: operation canceled
pub const ECANCELED: i16 = -125;

/// I2C engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// No free Future slot or not enough room in the command queue
    Again,
    /// Malformed request; nothing was changed
    Invalid,
    /// The Future is still referenced by queued or executing commands
    Busy,
    /// The slave did not acknowledge its address
    AddressNack,
    /// The slave did not acknowledge a data byte
    DataNack,
    /// Another master took over the bus
    ArbitrationLost,
    /// Unexpected TWI status
    Protocol(TwiStatus),
    /// The bus did not complete a phase in time (polled mode only)
    Timeout,
    /// More bytes were transferred than the Future can hold or provide
    IllegalSequence,
    /// The command was dropped because an earlier command failed
    Cancelled,
}

impl I2cError {
    /// Map an unexpected bus status to an error
    pub fn from_status(status: TwiStatus) -> Self {
        match status {
            TwiStatus::SLA_W_TRANSMITTED_NACK | TwiStatus::SLA_R_TRANSMITTED_NACK => {
                I2cError::AddressNack
            }
            TwiStatus::DATA_TRANSMITTED_NACK => I2cError::DataNack,
            TwiStatus::ARBITRATION_LOST => I2cError::ArbitrationLost,
            other => I2cError::Protocol(other),
        }
    }

    /// Negative errno-style code
    pub fn errno(self) -> i16 {
        match self {
            I2cError::Again => EAGAIN,
            I2cError::Invalid => EINVAL,
            I2cError::Busy => EBUSY,
            I2cError::AddressNack
            | I2cError::DataNack
            | I2cError::ArbitrationLost
            | I2cError::Protocol(_) => EPROTO,
            I2cError::Timeout => ETIME,
            I2cError::IllegalSequence => EILSEQ,
            I2cError::Cancelled => ECANCELED,
        }
    }

    /// Whether this error was produced by bus activity (as opposed to a
    /// rejected request)
    pub fn is_bus_fault(self) -> bool {
        !matches!(self, I2cError::Again | I2cError::Invalid | I2cError::Busy)
    }
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::Again => f.write_str("no room for transaction, retry later"),
            I2cError::Invalid => f.write_str("invalid request"),
            I2cError::Busy => f.write_str("future still in flight"),
            I2cError::AddressNack => f.write_str("address not acknowledged"),
            I2cError::DataNack => f.write_str("data not acknowledged"),
            I2cError::ArbitrationLost => f.write_str("arbitration lost"),
            I2cError::Protocol(status) => write!(f, "unexpected bus status {:?}", status),
            I2cError::Timeout => f.write_str("bus timeout"),
            I2cError::IllegalSequence => f.write_str("future buffer overrun"),
            I2cError::Cancelled => f.write_str("cancelled after earlier bus error"),
        }
    }
}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            I2cError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            I2cError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            I2cError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            I2cError::Protocol(TwiStatus::BUS_ERROR) => ErrorKind::Bus,
            I2cError::IllegalSequence => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}
