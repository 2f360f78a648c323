//! Manager configuration
//!
//! Selects how the engine is driven (interrupts or polling), what happens
//! to queued commands after a bus fault, and the bus timing handed to the
//! hardware on [`begin`](crate::manager::I2cManager::begin).

use fastwire_hal::I2cConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How bus phases are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionMode {
    /// The TWI interrupt calls `on_interrupt()` once per completed phase
    #[default]
    Async,
    /// `launch_commands()` polls the peripheral until its transaction is over
    ///
    /// Used on parts whose I2C peripheral cannot run the stepper from
    /// interrupts alone.
    Sync,
}

/// What to do with queued commands after a bus fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorPolicy {
    /// Keep executing queued commands
    DoNothing,
    /// Drop every queued command and fail all their Futures
    #[default]
    ClearAllCommands,
    /// Drop the remaining commands of the failing transaction only
    ClearTransactionCommands,
}

/// I2C manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManagerConfig {
    /// Bus speed and MCU clock
    pub bus: I2cConfig,
    /// Interrupt-driven or polled execution
    pub execution: ExecutionMode,
    /// Queue handling after a bus fault
    pub policy: ErrorPolicy,
    /// Maximum number of polls per bus phase in [`ExecutionMode::Sync`]
    /// before the phase is declared timed out (0 = wait forever)
    pub poll_limit: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bus: I2cConfig::STANDARD,
            execution: ExecutionMode::Async,
            policy: ErrorPolicy::ClearAllCommands,
            poll_limit: 0,
        }
    }
}

impl ManagerConfig {
    /// Default configuration with polled execution
    pub fn sync() -> Self {
        Self {
            execution: ExecutionMode::Sync,
            ..Self::default()
        }
    }

    /// Builder-style error policy override
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder-style poll limit override
    pub fn with_poll_limit(mut self, poll_limit: u32) -> Self {
        self.poll_limit = poll_limit;
        self
    }
}
