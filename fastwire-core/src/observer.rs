//! Hooks into the interrupt-side stepper
//!
//! An [`I2cObserver`] is handed to the manager once, at construction. The
//! stepper reports every bus step it starts, every status check it makes,
//! and the outcome of each interrupt. All hooks run in interrupt context
//! and must return quickly.

use heapless::Vec;

use fastwire_hal::TwiStatus;

use crate::future::{FutureId, FutureStatus};

/// Outcome of one call to [`on_interrupt`](crate::manager::I2cManager::on_interrupt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cCallback {
    /// Command still in progress (or nothing to do)
    #[default]
    None,
    /// A command completed; more commands of its transaction follow
    EndCommand,
    /// The last command of a transaction completed
    EndTransaction,
    /// A bus fault aborted the current command
    Error,
}

/// Step reported to [`I2cObserver::on_step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugStatus {
    Start,
    RepeatStart,
    Slaw,
    Slar,
    Send,
    Recv,
    RecvLast,
    Stop,
    SendOk,
    SendError,
    RecvOk,
    RecvError,
}

/// Receiver of stepper events
///
/// Every method defaults to doing nothing.
pub trait I2cObserver {
    /// A bus step was started or a data byte was handled; `data` is the
    /// address or data byte involved, 0 otherwise
    fn on_step(&self, _step: DebugStatus, _data: u8) {}

    /// The status of a completed phase was checked against the expected one
    fn on_status(&self, _expected: TwiStatus, _actual: TwiStatus) {}

    /// An interrupt was handled for the Future `id`
    fn on_callback(&self, _callback: I2cCallback, _id: Option<FutureId>) {}

    /// The Future `id` became READY or ERROR; runs before `on_callback`
    fn on_future_status(&self, _id: FutureId, _status: FutureStatus) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl I2cObserver for NoObserver {}

impl<T: I2cObserver + ?Sized> I2cObserver for &T {
    fn on_step(&self, step: DebugStatus, data: u8) {
        (**self).on_step(step, data);
    }

    fn on_status(&self, expected: TwiStatus, actual: TwiStatus) {
        (**self).on_status(expected, actual);
    }

    fn on_callback(&self, callback: I2cCallback, id: Option<FutureId>) {
        (**self).on_callback(callback, id);
    }

    fn on_future_status(&self, id: FutureId, status: FutureStatus) {
        (**self).on_future_status(id, status);
    }
}

/// Observer keeping only the last status check
///
/// Useful to tell which phase failed after a Future ended in ERROR.
pub struct LatestStatus {
    /// (expected, actual)
    latest: critical_section::Mutex<core::cell::Cell<(TwiStatus, TwiStatus)>>,
}

impl Default for LatestStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestStatus {
    pub const fn new() -> Self {
        Self {
            latest: critical_section::Mutex::new(core::cell::Cell::new((
                TwiStatus::NO_INFO,
                TwiStatus::NO_INFO,
            ))),
        }
    }

    fn get(&self) -> (TwiStatus, TwiStatus) {
        critical_section::with(|cs| self.latest.borrow(cs).get())
    }

    /// Status the hardware reported last; `NO_INFO` before any check
    pub fn latest_status(&self) -> TwiStatus {
        self.get().1
    }

    /// Status the stepper expected at that check
    pub fn latest_expected_status(&self) -> TwiStatus {
        self.get().0
    }
}

impl I2cObserver for LatestStatus {
    fn on_status(&self, expected: TwiStatus, actual: TwiStatus) {
        critical_section::with(|cs| self.latest.borrow(cs).set((expected, actual)));
    }
}

/// Which events a [`DebugRecorder`] keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebugFilter {
    pub steps: bool,
    pub statuses: bool,
    pub callbacks: bool,
}

impl DebugFilter {
    pub const ALL: Self = Self {
        steps: true,
        statuses: true,
        callbacks: true,
    };

    pub const STEPS: Self = Self {
        steps: true,
        statuses: false,
        callbacks: false,
    };
}

impl Default for DebugFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugEvent {
    Step(DebugStatus, u8),
    Status {
        expected: TwiStatus,
        actual: TwiStatus,
    },
    Callback(I2cCallback, Option<FutureId>),
}

/// Observer that records the first `N` events it is interested in
///
/// Once full, further events are counted but dropped.
pub struct DebugRecorder<const N: usize> {
    filter: DebugFilter,
    state: critical_section::Mutex<core::cell::RefCell<RecorderState<N>>>,
}

struct RecorderState<const N: usize> {
    events: Vec<DebugEvent, N>,
    dropped: usize,
}

impl<const N: usize> Default for DebugRecorder<N> {
    fn default() -> Self {
        Self::new(DebugFilter::ALL)
    }
}

impl<const N: usize> DebugRecorder<N> {
    pub const fn new(filter: DebugFilter) -> Self {
        Self {
            filter,
            state: critical_section::Mutex::new(core::cell::RefCell::new(RecorderState {
                events: Vec::new(),
                dropped: 0,
            })),
        }
    }

    fn record(&self, event: DebugEvent) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.events.push(event).is_err() {
                state.dropped += 1;
            }
        });
    }

    /// Copy of the recorded events, oldest first
    pub fn events(&self) -> Vec<DebugEvent, N> {
        critical_section::with(|cs| self.state.borrow_ref(cs).events.clone())
    }

    /// Number of events that did not fit
    pub fn dropped(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).dropped)
    }

    pub fn clear(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.events.clear();
            state.dropped = 0;
        });
    }
}

impl<const N: usize> I2cObserver for DebugRecorder<N> {
    fn on_step(&self, step: DebugStatus, data: u8) {
        if self.filter.steps {
            self.record(DebugEvent::Step(step, data));
        }
    }

    fn on_status(&self, expected: TwiStatus, actual: TwiStatus) {
        if self.filter.statuses {
            self.record(DebugEvent::Status { expected, actual });
        }
    }

    fn on_callback(&self, callback: I2cCallback, id: Option<FutureId>) {
        if self.filter.callbacks {
            self.record(DebugEvent::Callback(callback, id));
        }
    }
}
