//! I2C bus configuration
//!
//! Bus speed modes and the timing figures derived from them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// I2C bus speed mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum I2cMode {
    /// Standard mode (100 kHz)
    #[default]
    Standard,
    /// Fast mode (400 kHz)
    Fast,
}

impl I2cMode {
    /// SCL rate in Hz
    pub const fn rate_hz(self) -> u32 {
        match self {
            I2cMode::Standard => 100_000,
            I2cMode::Fast => 400_000,
        }
    }

    /// Setup time for a STOP condition (tSU;STO), in nanoseconds
    pub const fn stop_setup_ns(self) -> u32 {
        match self {
            I2cMode::Standard => 4_000,
            I2cMode::Fast => 600,
        }
    }

    /// Bus free time between a STOP and the next START (tBUF), in nanoseconds
    pub const fn bus_free_ns(self) -> u32 {
        match self {
            I2cMode::Standard => 4_700,
            I2cMode::Fast => 1_300,
        }
    }

    /// Delay a driver must observe after issuing STOP before the bus can be
    /// used again (tSU;STO + tBUF), in nanoseconds
    pub const fn delay_after_stop_ns(self) -> u32 {
        self.stop_setup_ns() + self.bus_free_ns()
    }
}

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cConfig {
    /// Bus speed mode
    pub mode: I2cMode,
    /// MCU clock frequency in Hz
    pub cpu_frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Standard mode on a 16 MHz MCU
    pub const STANDARD: Self = Self {
        mode: I2cMode::Standard,
        cpu_frequency: 16_000_000,
    };

    /// Fast mode on a 16 MHz MCU
    pub const FAST: Self = Self {
        mode: I2cMode::Fast,
        cpu_frequency: 16_000_000,
    };

    /// Bit-rate register value (TWBR) for a prescaler of 1
    ///
    /// SCL = F_CPU / (16 + 2 * TWBR), saturating at the register range.
    pub const fn bit_rate_register(&self) -> u8 {
        let rate = self.mode.rate_hz();
        let divider = self.cpu_frequency / rate;
        if divider <= 16 {
            return 0;
        }
        let twbr = (divider - 16) / 2;
        if twbr > u8::MAX as u32 {
            u8::MAX
        } else {
            twbr as u8
        }
    }
}
