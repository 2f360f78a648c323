//! Futures: results of asynchronous I2C transactions
//!
//! A [`Future`] is the client-side handle of one transaction. It owns the
//! typed input to transmit; once launched, its state (bytes sent and
//! received, status) lives in a slot of a [`FutureManager`] and the handle
//! only keeps the slot's stable [`FutureId`]. Moving the handle around is
//! therefore free, and the interrupt side never holds a reference into
//! client memory.
//!
//! ```text
//!            launch             last command done
//! INVALID ──────────▶ NOT_READY ─────────────────▶ READY ──get()──▶ INVALID
//!    ▲                    │                          │
//!    │                    └── bus fault ──▶ ERROR    │
//!    └──────────────── reset_() re-arms ◀────────────┘
//! ```

mod manager;
mod payload;
mod registry;
mod slot;

use core::marker::PhantomData;

pub use manager::{FutureManager, FutureStore};
pub use payload::Payload;
pub use registry::{FutureId, FutureRegistry};
pub use slot::{FutureSlot, MAX_PAYLOAD_SIZE};

pub(crate) use slot::{retire_command, take_changes};

use crate::errors::I2cError;

/// Told when a registered Future leaves NOT_READY
///
/// Called after the interrupt that finished or failed the Future, outside
/// the critical section, so implementations may query or launch Futures.
pub trait FutureListener {
    fn on_status_change(&self, id: FutureId, status: FutureStatus);
}

/// Status of a Future
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FutureStatus {
    /// Not registered, or its output was already consumed
    #[default]
    Invalid,
    /// Waiting for the bus
    NotReady,
    /// Output available through [`Future::get`]
    Ready,
    /// Failed; see [`Future::error`]
    Error,
}

/// Handle to the result of an I2C transaction
///
/// `OUT` is the value read from the device, `IN` the value written to it.
pub struct Future<'m, OUT: Payload = (), IN: Payload = ()> {
    input: IN,
    binding: Option<(FutureId, &'m dyn FutureStore)>,
    _output: PhantomData<fn() -> OUT>,
}

impl<'m, OUT: Payload, IN: Payload> Future<'m, OUT, IN> {
    const FITS: () = assert!(OUT::SIZE <= MAX_PAYLOAD_SIZE && IN::SIZE <= MAX_PAYLOAD_SIZE);

    /// New unregistered Future that will transmit `input`
    pub fn new(input: IN) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS;
        Self {
            input,
            binding: None,
            _output: PhantomData,
        }
    }

    /// Registry ID, once launched
    pub fn id(&self) -> Option<FutureId> {
        self.binding.map(|(id, _)| id)
    }

    pub fn is_registered(&self) -> bool {
        self.binding.is_some()
    }

    /// Value that is (or will be) transmitted
    pub fn input(&self) -> &IN {
        &self.input
    }

    /// Current status; never blocks
    pub fn status(&self) -> FutureStatus {
        match self.binding {
            Some((id, store)) => store.status(id),
            None => FutureStatus::Invalid,
        }
    }

    /// Spin until the transaction is over and return its final status
    ///
    /// Must not be called from the I2C interrupt.
    pub fn wait(&self) -> FutureStatus {
        loop {
            let status = self.status();
            if status != FutureStatus::NotReady {
                return status;
            }
            core::hint::spin_loop();
        }
    }

    /// Take the received value
    ///
    /// Only succeeds when the Future is READY; the Future becomes INVALID
    /// afterwards.
    pub fn get(&self) -> Option<OUT> {
        let (id, store) = self.binding?;
        let mut raw = [0u8; MAX_PAYLOAD_SIZE];
        let raw = &mut raw[..OUT::SIZE];
        store.take_output(id, raw).then(|| OUT::decode(raw))
    }

    /// Error that ended the transaction, if the status is ERROR
    pub fn error(&self) -> Option<I2cError> {
        let (id, store) = self.binding?;
        store.error(id)
    }

    /// Re-arm the Future with a new input, keeping its ID
    ///
    /// Fails with [`I2cError::Busy`], changing nothing, while commands of
    /// the previous launch are still queued or executing.
    pub fn reset_(&mut self, input: IN) -> Result<(), I2cError> {
        if let Some((id, store)) = self.binding {
            let mut raw = [0u8; MAX_PAYLOAD_SIZE];
            let raw = &mut raw[..IN::SIZE];
            input.encode(raw);
            store.rearm(id, raw, OUT::SIZE)?;
        }
        self.input = input;
        Ok(())
    }

    /// Encoded input, as handed to the registry on launch
    pub(crate) fn encode_input(&self, raw: &mut [u8; MAX_PAYLOAD_SIZE]) -> usize {
        self.input.encode(&mut raw[..IN::SIZE]);
        IN::SIZE
    }

    pub(crate) fn binding(&self) -> Option<(FutureId, &'m dyn FutureStore)> {
        self.binding
    }

    pub(crate) fn bind(&mut self, id: FutureId, store: &'m dyn FutureStore) {
        self.binding = Some((id, store));
    }
}

impl<OUT: Payload, IN: Payload + Default> Default for Future<'_, OUT, IN> {
    fn default() -> Self {
        Self::new(IN::default())
    }
}

impl<OUT: Payload, IN: Payload> Drop for Future<'_, OUT, IN> {
    fn drop(&mut self) {
        if let Some((id, store)) = self.binding.take() {
            store.release(id);
        }
    }
}

impl<OUT: Payload, IN: Payload + core::fmt::Debug> core::fmt::Debug for Future<'_, OUT, IN> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("input", &self.input)
            .finish()
    }
}
