//! Byte-level Future state
//!
//! A [`FutureSlot`] is what lives in the registry behind a [`FutureId`]:
//! the bytes to transmit, the bytes received so far, the status and the
//! bookkeeping the stepper needs. Methods ending in `_` are called with the
//! registry borrowed inside a critical section.

use heapless::Vec;

use super::registry::{FutureId, FutureRegistry};
use super::FutureStatus;
use crate::errors::I2cError;

/// Largest input or output a Future can carry, in bytes
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// State of one registered Future
#[derive(Debug, Clone)]
pub struct FutureSlot {
    status: FutureStatus,
    error: Option<I2cError>,
    /// Bytes to transmit
    input: Vec<u8, MAX_PAYLOAD_SIZE>,
    /// Number of input bytes already handed to the bus
    input_sent: usize,
    /// Bytes received so far
    output: Vec<u8, MAX_PAYLOAD_SIZE>,
    /// Number of bytes expected in `output`
    output_size: usize,
    /// Commands queued or executing that reference this slot
    pending: u8,
    /// The client handle was dropped while commands were pending
    orphaned: bool,
    /// Status left NOT_READY and listeners have not been told yet
    changed: bool,
}

impl FutureSlot {
    /// Fresh NOT_READY state for a transaction
    pub fn armed(input: &[u8], output_size: usize) -> Result<Self, I2cError> {
        if output_size > MAX_PAYLOAD_SIZE {
            return Err(I2cError::Invalid);
        }
        let input = Vec::from_slice(input).map_err(|_| I2cError::Invalid)?;
        Ok(Self {
            status: FutureStatus::NotReady,
            error: None,
            input,
            input_sent: 0,
            output: Vec::new(),
            output_size,
            pending: 0,
            orphaned: false,
            changed: false,
        })
    }

    pub fn status(&self) -> FutureStatus {
        self.status
    }

    /// Stored error, only while the status is ERROR
    pub fn error(&self) -> Option<I2cError> {
        match self.status {
            FutureStatus::Error => self.error,
            _ => None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input.len()
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Input bytes not transmitted yet
    pub fn input_remaining(&self) -> usize {
        self.input.len() - self.input_sent
    }

    /// Output bytes not received yet
    pub fn output_remaining(&self) -> usize {
        self.output_size - self.output.len()
    }

    /// Number of commands still referencing this slot
    pub fn pending(&self) -> u8 {
        self.pending
    }

    pub fn is_orphaned(&self) -> bool {
        self.orphaned
    }

    /// Input can only be replaced before its first byte hits the bus
    pub fn can_replace_input_(&self) -> bool {
        self.input_sent == 0
    }

    /// Next input byte to transmit
    pub fn get_chunk_(&mut self) -> Option<u8> {
        let byte = *self.input.get(self.input_sent)?;
        self.input_sent += 1;
        Some(byte)
    }

    /// Append a received byte
    ///
    /// Fails if the Future is no longer waiting or its output is full.
    pub fn set_chunk_(&mut self, byte: u8) -> bool {
        if self.status != FutureStatus::NotReady || self.output_remaining() == 0 {
            return false;
        }
        self.output.push(byte).is_ok()
    }

    /// Mark the Future complete
    ///
    /// A Future whose output is not complete becomes ERROR instead of READY.
    pub fn set_finish_(&mut self) -> bool {
        if self.status != FutureStatus::NotReady {
            return false;
        }
        if self.output_remaining() == 0 {
            self.status = FutureStatus::Ready;
        } else {
            self.error = Some(I2cError::IllegalSequence);
            self.status = FutureStatus::Error;
        }
        self.changed = true;
        true
    }

    /// Mark the Future failed; the first error wins
    pub fn set_error_(&mut self, error: I2cError) -> bool {
        if self.status != FutureStatus::NotReady {
            return false;
        }
        self.error = Some(error);
        self.status = FutureStatus::Error;
        self.changed = true;
        true
    }

    /// Final status, once per completion
    pub fn take_change_(&mut self) -> Option<FutureStatus> {
        if !self.changed {
            return None;
        }
        self.changed = false;
        Some(self.status)
    }

    /// Copy the output out of a READY Future and invalidate it
    pub fn take_output_(&mut self, out: &mut [u8]) -> bool {
        if self.status != FutureStatus::Ready || out.len() != self.output.len() {
            return false;
        }
        out.copy_from_slice(&self.output);
        self.status = FutureStatus::Invalid;
        true
    }

    /// Account for `count` more commands referencing this slot
    pub fn attach_(&mut self, count: u8) {
        self.pending = self.pending.saturating_add(count);
    }

    /// A command referencing this slot has been executed or dropped
    ///
    /// Returns true when the slot was orphaned and nothing references it
    /// any more, i.e. it must be unregistered.
    pub fn detach_(&mut self) -> bool {
        self.pending = self.pending.saturating_sub(1);
        self.orphaned && self.pending == 0
    }

    /// The client handle is gone but commands are still pending
    pub fn orphan_(&mut self) {
        self.orphaned = true;
    }
}

/// Retire one command of `id`, reclaiming the slot if it was orphaned
pub(crate) fn retire_command<const N: usize>(
    registry: &mut FutureRegistry<FutureSlot, N>,
    id: FutureId,
) {
    let reclaim = registry.find_mut_(id).is_some_and(FutureSlot::detach_);
    if reclaim {
        registry.unregister_(id);
    }
}

/// Collect the Futures of `registry` that completed since the last call
///
/// Reported in slot order along with their final status.
pub(crate) fn take_changes<const N: usize>(
    registry: &mut FutureRegistry<FutureSlot, N>,
) -> Vec<(FutureId, FutureStatus), N> {
    registry
        .iter_mut_()
        .filter_map(|(id, slot)| slot.take_change_().map(|status| (id, status)))
        .collect()
}
