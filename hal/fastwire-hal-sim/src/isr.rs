//! Simulated TWI interrupt
//!
//! On the target the TWI vector calls [`I2cManager::on_interrupt`] once per
//! completed bus phase. On the host a dedicated thread plays that role: the
//! simulated peripheral posts an [`IsrEvent`] on a bounded channel and
//! [`run_isr`] handles them one at a time, in order.

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use fastwire_core::observer::I2cObserver;
use fastwire_core::{FutureListener, I2cCallback, I2cManager};
use fastwire_hal::TwiHardware;

/// Capacity of the interrupt event channel
///
/// At most one phase is in progress at a time, so one pending event per
/// phase plus a shutdown request always fit.
pub const ISR_QUEUE_SIZE: usize = 4;

/// Message to the interrupt thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IsrEvent {
    /// A bus phase completed (TWINT raised)
    Twint,
    /// Exit the interrupt loop
    Shutdown,
}

pub type IsrChannel = Channel<CriticalSectionRawMutex, IsrEvent, ISR_QUEUE_SIZE>;

/// Callbacks seen by an interrupt loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsrStats {
    pub interrupts: usize,
    pub transactions: usize,
    pub errors: usize,
}

impl IsrStats {
    fn count(&mut self, callback: I2cCallback) {
        self.interrupts += 1;
        match callback {
            I2cCallback::EndTransaction => self.transactions += 1,
            I2cCallback::Error => self.errors += 1,
            I2cCallback::None | I2cCallback::EndCommand => {}
        }
    }
}

/// Interrupt thread body: handle events until [`IsrEvent::Shutdown`]
pub fn run_isr<H, O, const Q: usize, const F: usize>(
    manager: &I2cManager<H, O, Q, F>,
    events: &IsrChannel,
) -> IsrStats
where
    H: TwiHardware,
    O: I2cObserver,
{
    let mut stats = IsrStats::default();
    loop {
        match block_on(events.receive()) {
            IsrEvent::Twint => stats.count(manager.on_interrupt()),
            IsrEvent::Shutdown => return stats,
        }
    }
}

/// Handle pending events on the calling thread until the bus goes quiet
///
/// Deterministic alternative to [`run_isr`], for buses with interrupts
/// disabled.
pub fn run_until_idle<H, O, const Q: usize, const F: usize>(
    manager: &I2cManager<H, O, Q, F>,
) -> IsrStats
where
    H: TwiHardware,
    O: I2cObserver,
{
    let mut stats = IsrStats::default();
    while manager.event_pending() {
        stats.count(manager.on_interrupt());
    }
    stats
}

/// [`run_until_idle`] reporting Future changes to `listener`, e.g. a
/// [`FuturesGroup`](fastwire_core::FuturesGroup)
pub fn run_until_idle_with<H, O, const Q: usize, const F: usize>(
    manager: &I2cManager<H, O, Q, F>,
    listener: &dyn FutureListener,
) -> IsrStats
where
    H: TwiHardware,
    O: I2cObserver,
{
    let mut stats = IsrStats::default();
    while manager.event_pending() {
        stats.count(manager.on_interrupt_with(listener));
    }
    stats
}
