//! I2C manager
//!
//! Owns the TWI peripheral, the command queue, the protocol stepper and the
//! Future registry. Client code reaches it through [`I2cDevice`]s (via the
//! object-safe [`CommandSink`] trait); the TWI interrupt reaches it through
//! [`I2cManager::on_interrupt`].
//!
//! [`I2cDevice`]: crate::device::I2cDevice

use core::cell::RefCell;

use critical_section::Mutex;
use fastwire_hal::TwiHardware;

use crate::command::{resolved_count, Command, CommandQueue, I2cFinish, LightCommand};
use crate::config::{ExecutionMode, ManagerConfig};
use crate::errors::I2cError;
use crate::future::{
    take_changes, FutureId, FutureListener, FutureManager, FutureSlot, FutureStatus, FutureStore,
};
use crate::observer::{I2cCallback, I2cObserver, NoObserver};
use crate::stepper::{BusPhase, StepIo, Stepper};

/// Default command queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 32;
/// Default number of live Futures
pub const DEFAULT_MAX_FUTURES: usize = 16;

/// One transaction handed to [`CommandSink::launch`]
#[derive(Debug, Clone, Copy)]
pub struct Launch<'a> {
    /// Device address, already shifted left by one
    pub target: u8,
    /// ID of a Future re-armed for a new launch
    pub rearmed: Option<FutureId>,
    /// Encoded Future input
    pub input: &'a [u8],
    /// Future output size in bytes
    pub output_size: usize,
    pub commands: &'a [LightCommand],
}

/// Where [`I2cDevice`](crate::device::I2cDevice)s send their transactions
pub trait CommandSink {
    /// Storage of the Futures launched through this sink
    fn futures(&self) -> &dyn FutureStore;

    /// Register the Future and queue all commands of a transaction
    /// atomically
    ///
    /// Byte counts must already be validated against the Future sizes.
    fn launch(&self, launch: Launch<'_>) -> Result<FutureId, I2cError>;
}

struct Bus<H, const Q: usize> {
    hw: H,
    queue: CommandQueue<Q>,
    stepper: Stepper,
}

/// Asynchronous I2C master
pub struct I2cManager<
    H,
    O = NoObserver,
    const Q: usize = DEFAULT_QUEUE_SIZE,
    const F: usize = DEFAULT_MAX_FUTURES,
> {
    config: ManagerConfig,
    bus: Mutex<RefCell<Bus<H, Q>>>,
    futures: FutureManager<F>,
    observer: O,
}

impl<H: TwiHardware, const Q: usize, const F: usize> I2cManager<H, NoObserver, Q, F> {
    pub fn new(hw: H, config: ManagerConfig) -> Self {
        Self::with_observer(hw, config, NoObserver)
    }
}

impl<H: TwiHardware, O: I2cObserver, const Q: usize, const F: usize> I2cManager<H, O, Q, F> {
    /// Manager reporting stepper events to `observer`
    pub fn with_observer(hw: H, config: ManagerConfig, observer: O) -> Self {
        Self {
            config,
            bus: Mutex::new(RefCell::new(Bus {
                hw,
                queue: CommandQueue::new(),
                stepper: Stepper::new(config.policy),
            })),
            futures: FutureManager::new(),
            observer,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Enable the TWI peripheral
    pub fn begin(&self) {
        debug!(
            "i2c begin: {=u32} Hz, {} mode",
            self.config.bus.mode.rate_hz(),
            self.config.execution
        );
        critical_section::with(|cs| {
            let mut bus = self.bus.borrow_ref_mut(cs);
            bus.hw.begin(&self.config.bus);
        });
    }

    /// Disable the TWI peripheral
    pub fn end(&self) {
        critical_section::with(|cs| self.bus.borrow_ref_mut(cs).hw.end());
    }

    /// Handle one completed bus phase
    ///
    /// To be called from the TWI interrupt, once per event.
    pub fn on_interrupt(&self) -> I2cCallback {
        self.drive(None, None)
    }

    /// Like [`on_interrupt`](Self::on_interrupt), also telling `listener`
    /// about every Future the event finished or failed
    pub fn on_interrupt_with(&self, listener: &dyn FutureListener) -> I2cCallback {
        self.drive(Some(listener), None)
    }

    /// Abort the command in progress with `error`
    ///
    /// The configured error policy applies as for a bus fault. Used by the
    /// polled mode when the bus stops responding.
    pub fn abort(&self, error: I2cError) -> I2cCallback {
        self.drive(None, Some(error))
    }

    fn drive(
        &self,
        listener: Option<&dyn FutureListener>,
        abort: Option<I2cError>,
    ) -> I2cCallback {
        let (callback, id, changes) = critical_section::with(|cs| {
            let mut bus = self.bus.borrow_ref_mut(cs);
            let mut registry = self.futures.registry_(cs);
            let bus = &mut *bus;
            let id = bus.stepper.current_future();
            let mut io = StepIo {
                hw: &mut bus.hw,
                queue: &mut bus.queue,
                registry: &mut *registry,
                observer: &self.observer,
            };
            let callback = match abort {
                Some(error) => bus.stepper.abort_(&mut io, error),
                None => bus.stepper.step_(&mut io),
            };
            (callback, id, take_changes(&mut *registry))
        });
        for &(changed, status) in &changes {
            self.observer.on_future_status(changed, status);
            if let Some(listener) = listener {
                listener.on_status_change(changed, status);
            }
        }
        if callback != I2cCallback::None {
            self.observer.on_callback(callback, id);
        }
        callback
    }

    /// Whether the peripheral has an unhandled event (TWINT)
    pub fn event_pending(&self) -> bool {
        critical_section::with(|cs| self.bus.borrow_ref(cs).hw.event_pending())
    }

    pub fn phase(&self) -> BusPhase {
        critical_section::with(|cs| self.bus.borrow_ref(cs).stepper.phase())
    }

    /// No command executing and none queued
    pub fn is_idle(&self) -> bool {
        critical_section::with(|cs| {
            let bus = self.bus.borrow_ref(cs);
            bus.stepper.is_idle() && bus.queue.empty_()
        })
    }

    /// Room left in the command queue
    pub fn queue_free(&self) -> usize {
        critical_section::with(|cs| self.bus.borrow_ref(cs).queue.free_())
    }

    pub fn available_futures(&self) -> usize {
        self.futures.available_futures()
    }

    fn in_flight(&self, id: FutureId) -> bool {
        critical_section::with(|cs| {
            self.futures
                .registry_(cs)
                .find_(id)
                .is_some_and(|slot| slot.pending() > 0)
        })
    }

    /// Drive the stepper by polling until `id` has no command left
    fn run_to_completion(&self, id: FutureId) {
        let limit = self.config.poll_limit;
        let mut polls: u32 = 0;
        while self.in_flight(id) {
            if self.event_pending() {
                self.on_interrupt();
                polls = 0;
                continue;
            }
            polls = polls.saturating_add(1);
            if limit != 0 && polls >= limit {
                warn!("i2c bus timeout after {=u32} polls", polls);
                self.abort(I2cError::Timeout);
                polls = 0;
            }
            core::hint::spin_loop();
        }
    }
}

impl<H: TwiHardware, O: I2cObserver, const Q: usize, const F: usize> CommandSink
    for I2cManager<H, O, Q, F>
{
    fn futures(&self) -> &dyn FutureStore {
        &self.futures
    }

    fn launch(&self, launch: Launch<'_>) -> Result<FutureId, I2cError> {
        let count = launch.commands.len();
        let attached = u8::try_from(count).map_err(|_| I2cError::Invalid)?;
        if count == 0 {
            return Err(I2cError::Invalid);
        }
        let fresh = FutureSlot::armed(launch.input, launch.output_size)?;

        let id = critical_section::with(|cs| {
            let mut bus = self.bus.borrow_ref_mut(cs);
            let mut registry = self.futures.registry_(cs);
            let bus = &mut *bus;

            if bus.queue.free_() < count {
                return Err(I2cError::Again);
            }
            let id = match launch.rearmed {
                Some(id) => {
                    let slot = registry.find_(id).ok_or(I2cError::Invalid)?;
                    if slot.pending() > 0 {
                        return Err(I2cError::Busy);
                    }
                    if slot.status() != FutureStatus::NotReady {
                        return Err(I2cError::Invalid);
                    }
                    registry.move_(id, fresh).map_err(|_| I2cError::Invalid)?;
                    id
                }
                None => registry.register_(fresh).ok_or(I2cError::Again)?,
            };
            if let Some(slot) = registry.find_mut_(id) {
                slot.attach_(attached);
            }

            for (index, light) in launch.commands.iter().enumerate() {
                let last = index + 1 == count;
                let command = Command {
                    kind: light.kind,
                    target: launch.target,
                    byte_count: resolved_count(light, launch.input.len(), launch.output_size),
                    force_stop: light.finish.contains(I2cFinish::FORCE_STOP),
                    finish_future: last || light.finish.contains(I2cFinish::FUTURE_FINISH),
                    end_transaction: last,
                    future_id: id,
                };
                bus.queue.push_(command).map_err(|_| I2cError::Again)?;
            }
            trace!("queued {=usize} commands for future {=u8}", count, id.get());

            let mut io = StepIo {
                hw: &mut bus.hw,
                queue: &mut bus.queue,
                registry: &mut *registry,
                observer: &self.observer,
            };
            bus.stepper.kick_(&mut io);
            Ok(id)
        })?;

        if self.config.execution == ExecutionMode::Sync {
            self.run_to_completion(id);
        }
        Ok(id)
    }
}
