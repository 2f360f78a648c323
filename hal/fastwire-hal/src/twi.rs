//! TWI (two-wire interface) hardware primitives
//!
//! The engine drives the bus one phase at a time: it asks the peripheral
//! to perform a START, send a byte, receive a byte or STOP, and then waits
//! for the peripheral to signal that the phase is over (the TWINT flag on
//! ATmega parts). The outcome of the phase is read back as a [`TwiStatus`].

use core::fmt;

/// TWI status register value (TWSR with prescaler bits masked out)
///
/// Codes follow the ATmega master-mode status table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwiStatus(u8);

impl TwiStatus {
    /// Illegal START or STOP condition
    pub const BUS_ERROR: Self = Self(0x00);
    /// START condition transmitted
    pub const START_TRANSMITTED: Self = Self(0x08);
    /// Repeated START condition transmitted
    pub const REPEAT_START_TRANSMITTED: Self = Self(0x10);
    /// SLA+W transmitted, ACK received
    pub const SLA_W_TRANSMITTED_ACK: Self = Self(0x18);
    /// SLA+W transmitted, NACK received
    pub const SLA_W_TRANSMITTED_NACK: Self = Self(0x20);
    /// Data byte transmitted, ACK received
    pub const DATA_TRANSMITTED_ACK: Self = Self(0x28);
    /// Data byte transmitted, NACK received
    pub const DATA_TRANSMITTED_NACK: Self = Self(0x30);
    /// Arbitration lost in SLA+R/W or data bytes
    pub const ARBITRATION_LOST: Self = Self(0x38);
    /// SLA+R transmitted, ACK received
    pub const SLA_R_TRANSMITTED_ACK: Self = Self(0x40);
    /// SLA+R transmitted, NACK received
    pub const SLA_R_TRANSMITTED_NACK: Self = Self(0x48);
    /// Data byte received, ACK returned
    pub const DATA_RECEIVED_ACK: Self = Self(0x50);
    /// Data byte received, NACK returned
    pub const DATA_RECEIVED_NACK: Self = Self(0x58);
    /// No relevant state information available
    pub const NO_INFO: Self = Self(0xF8);

    const MASK: u8 = 0xF8;

    /// Build a status from a raw status register value
    ///
    /// The prescaler bits (TWPS1:0) and the reserved bit are ignored.
    pub const fn from_register(value: u8) -> Self {
        Self(value & Self::MASK)
    }

    /// Raw status code
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Whether this status reports that the addressed slave did not acknowledge
    pub fn is_address_nack(self) -> bool {
        self == Self::SLA_W_TRANSMITTED_NACK || self == Self::SLA_R_TRANSMITTED_NACK
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::BUS_ERROR => "BUS_ERROR",
            Self::START_TRANSMITTED => "START",
            Self::REPEAT_START_TRANSMITTED => "REPEAT_START",
            Self::SLA_W_TRANSMITTED_ACK => "SLA_W_ACK",
            Self::SLA_W_TRANSMITTED_NACK => "SLA_W_NACK",
            Self::DATA_TRANSMITTED_ACK => "DATA_TX_ACK",
            Self::DATA_TRANSMITTED_NACK => "DATA_TX_NACK",
            Self::ARBITRATION_LOST => "ARBITRATION_LOST",
            Self::SLA_R_TRANSMITTED_ACK => "SLA_R_ACK",
            Self::SLA_R_TRANSMITTED_NACK => "SLA_R_NACK",
            Self::DATA_RECEIVED_ACK => "DATA_RX_ACK",
            Self::DATA_RECEIVED_NACK => "DATA_RX_NACK",
            Self::NO_INFO => "NO_INFO",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for TwiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}(0x{:02X})", name, self.0),
            None => write!(f, "TwiStatus(0x{:02X})", self.0),
        }
    }
}

/// TWI peripheral in master mode
///
/// Every method except [`stop`](TwiHardware::stop), [`idle`](TwiHardware::idle),
/// [`begin`](TwiHardware::begin) and [`end`](TwiHardware::end) starts a bus
/// phase whose completion is signalled asynchronously: either by the TWI
/// interrupt, or by [`event_pending`](TwiHardware::event_pending) becoming
/// true when the peripheral is polled.
///
/// Implementations must not block inside these methods (except for the short
/// post-STOP delay mandated by the bus timing).
pub trait TwiHardware {
    /// Enable the peripheral: pull-ups on SDA/SCL, bit rate, TWI enable
    fn begin(&mut self, config: &crate::I2cConfig);

    /// Disable the peripheral and release the pull-ups
    fn end(&mut self);

    /// Request a START condition
    ///
    /// If the bus is still held by this master (no STOP since the last
    /// START), the peripheral produces a repeated START instead.
    fn start(&mut self);

    /// Send one byte (SLA+R/W or data)
    fn send(&mut self, byte: u8);

    /// Receive one byte, answering ACK if `ack` is true, NACK otherwise
    fn receive(&mut self, ack: bool);

    /// Issue a STOP condition and release the bus
    ///
    /// No completion event follows a STOP.
    fn stop(&mut self);

    /// Acknowledge the last event without starting a new phase
    ///
    /// Called when there is nothing left to execute.
    fn idle(&mut self);

    /// Status of the last completed phase
    fn status(&self) -> TwiStatus;

    /// Last received byte
    fn data(&self) -> u8;

    /// Whether a phase has completed and awaits handling (TWINT set)
    fn event_pending(&self) -> bool;
}
