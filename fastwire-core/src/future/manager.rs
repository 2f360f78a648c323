//! Synchronized access to the Future registry
//!
//! The registry is shared between client code (which owns [`Future`]
//! handles) and the interrupt-side stepper (which fills them). Every access
//! goes through a `critical_section` mutex; the `_`-suffixed accessors take
//! the caller's [`CriticalSection`] token so that the manager can update the
//! registry and its command queue in one atomic section.
//!
//! [`Future`]: super::Future

use core::cell::{RefCell, RefMut};

use critical_section::{CriticalSection, Mutex};

use super::registry::{FutureId, FutureRegistry};
use super::slot::FutureSlot;
use super::FutureStatus;
use crate::errors::I2cError;

/// Storage behind [`Future`](super::Future) handles
///
/// Object safe, so that a handle only needs a `&dyn FutureStore` and stays
/// independent of the registry capacity.
pub trait FutureStore {
    /// Status of `id`; unregistered IDs are [`FutureStatus::Invalid`]
    fn status(&self, id: FutureId) -> FutureStatus;

    /// Error stored for `id`, if its status is ERROR
    fn error(&self, id: FutureId) -> Option<I2cError>;

    /// Copy the output of a READY Future into `out` and invalidate it
    fn take_output(&self, id: FutureId, out: &mut [u8]) -> bool;

    /// Re-arm `id` to NOT_READY with a new input, keeping its ID
    ///
    /// Fails with [`I2cError::Busy`] while commands still reference it.
    fn rearm(&self, id: FutureId, input: &[u8], output_size: usize) -> Result<(), I2cError>;

    /// The client handle of `id` is gone
    ///
    /// The slot is freed at once, or once its last pending command retires.
    fn release(&self, id: FutureId);
}

/// Registry of [`FutureSlot`]s protected by a critical section
pub struct FutureManager<const N: usize> {
    registry: Mutex<RefCell<FutureRegistry<FutureSlot, N>>>,
}

impl<const N: usize> Default for FutureManager<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FutureManager<N> {
    pub const fn new() -> Self {
        Self {
            registry: Mutex::new(RefCell::new(FutureRegistry::new())),
        }
    }

    /// Maximum number of live Futures
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of free Future slots
    pub fn available_futures(&self) -> usize {
        critical_section::with(|cs| self.available_futures_(cs))
    }

    pub fn available_futures_(&self, cs: CriticalSection<'_>) -> usize {
        self.registry_(cs).available_()
    }

    /// Borrow the registry inside an existing critical section
    pub fn registry_<'cs>(
        &'cs self,
        cs: CriticalSection<'cs>,
    ) -> RefMut<'cs, FutureRegistry<FutureSlot, N>> {
        self.registry.borrow_ref_mut(cs)
    }

    fn with_slot<R>(&self, id: FutureId, f: impl FnOnce(&mut FutureSlot) -> R) -> Option<R> {
        critical_section::with(|cs| self.registry_(cs).find_mut_(id).map(f))
    }
}

impl<const N: usize> FutureStore for FutureManager<N> {
    fn status(&self, id: FutureId) -> FutureStatus {
        self.with_slot(id, |slot| slot.status())
            .unwrap_or(FutureStatus::Invalid)
    }

    fn error(&self, id: FutureId) -> Option<I2cError> {
        self.with_slot(id, |slot| slot.error()).flatten()
    }

    fn take_output(&self, id: FutureId, out: &mut [u8]) -> bool {
        self.with_slot(id, |slot| slot.take_output_(out))
            .unwrap_or(false)
    }

    fn rearm(&self, id: FutureId, input: &[u8], output_size: usize) -> Result<(), I2cError> {
        let fresh = FutureSlot::armed(input, output_size)?;
        critical_section::with(|cs| {
            let mut registry = self.registry_(cs);
            let pending = registry.find_(id).ok_or(I2cError::Invalid)?.pending();
            if pending > 0 {
                return Err(I2cError::Busy);
            }
            registry
                .move_(id, fresh)
                .map(drop)
                .map_err(|_| I2cError::Invalid)
        })
    }

    fn release(&self, id: FutureId) {
        critical_section::with(|cs| {
            let mut registry = self.registry_(cs);
            let Some(slot) = registry.find_mut_(id) else {
                return;
            };
            if slot.pending() > 0 {
                debug!("future {=u8} dropped in flight", id.get());
                slot.orphan_();
            } else {
                registry.unregister_(id);
            }
        });
    }
}
