//! Slot registry mapping stable Future IDs to Future state
//!
//! Each registered entry lives in a fixed slot for its whole registered
//! lifetime; its ID is `slot index + 1`, so 0 never names a live entry.
//! Code running in interrupt context only ever holds the ID, never a
//! reference, so the entry stored behind an ID can be replaced
//! ([`move_`](FutureRegistry::move_)) without invalidating anyone.
//!
//! Methods ending in `_` are not synchronized; callers must hold a critical
//! section (see [`FutureManager`](super::FutureManager)).

use core::num::NonZeroU8;

/// Stable identifier of a registered Future
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FutureId(NonZeroU8);

impl FutureId {
    /// Build an ID from its raw value; 0 is not a valid ID
    pub const fn new(raw: u8) -> Option<Self> {
        match NonZeroU8::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Raw ID value (never 0)
    pub const fn get(self) -> u8 {
        self.0.get()
    }

    fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::new)
    }

    fn index(self) -> usize {
        usize::from(self.0.get()) - 1
    }
}

/// Fixed-capacity slot table
pub struct FutureRegistry<T, const N: usize> {
    slots: [Option<T>; N],
    /// ID of the most recently released slot (0 = none yet)
    last_removed_id: u8,
}

impl<T, const N: usize> Default for FutureRegistry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> FutureRegistry<T, N> {
    const VALID_CAPACITY: () = assert!(N >= 1 && N <= u8::MAX as usize);

    /// Create an empty registry
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            slots: [const { None }; N],
            last_removed_id: 0,
        }
    }

    /// Total number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Store `entry` in a free slot and return its new ID
    ///
    /// The scan starts at the most recently freed slot and wraps around.
    /// Returns `None`, leaving the registry untouched, when every slot is
    /// taken.
    pub fn register_(&mut self, entry: T) -> Option<FutureId> {
        let start = usize::from(self.last_removed_id.saturating_sub(1));
        let index = (start..N)
            .chain(0..start)
            .find(|&index| self.slots[index].is_none())?;
        let id = FutureId::from_index(index)?;
        self.slots[index] = Some(entry);
        Some(id)
    }

    /// Release the slot of `id` and return what it held
    ///
    /// Returns `None` if `id` is out of range or its slot is already free.
    pub fn unregister_(&mut self, id: FutureId) -> Option<T> {
        let entry = self.slots.get_mut(id.index())?.take()?;
        self.last_removed_id = id.get();
        Some(entry)
    }

    /// Replace the entry stored for `id`, keeping the ID
    ///
    /// Returns the previous entry, or gives `entry` back if `id` is not
    /// registered.
    pub fn move_(&mut self, id: FutureId, entry: T) -> Result<T, T> {
        match self.slots.get_mut(id.index()) {
            Some(Some(current)) => Ok(core::mem::replace(current, entry)),
            _ => Err(entry),
        }
    }

    /// Current entry for `id`
    pub fn find_(&self, id: FutureId) -> Option<&T> {
        self.slots.get(id.index())?.as_ref()
    }

    /// Current entry for `id`, mutably
    pub fn find_mut_(&mut self, id: FutureId) -> Option<&mut T> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Number of free slots
    pub fn available_(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// Registered entries with their IDs, in slot order
    pub fn iter_mut_(&mut self) -> impl Iterator<Item = (FutureId, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| Some((FutureId::from_index(index)?, slot.as_mut()?)))
    }
}
