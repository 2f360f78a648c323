//! I2C protocol stepper
//!
//! Executes queued commands one bus phase at a time. Each completed phase
//! (one TWI interrupt) is checked against the status the stepper expects,
//! then the next phase is started:
//!
//! ```text
//!            ┌──────────────── read ─────────────────┐
//!            │                                       ▼
//! START ──▶ SLA+W ──▶ SEND* ──┐        SLA+R ──▶ RECV* ──▶ RECV_LAST ──┐
//!   ▲                         │                                        │
//!   │                         ▼                                        ▼
//!   └──── REPEAT_START ◀── command done ◀──────────────────────────────┘
//!                             │
//!                             └──▶ STOP (queue empty or forced) ──▶ IDLE
//! ```
//!
//! Every received byte but the last is ACKed; the last one is NACKed. A
//! NACK on the last byte of a write is tolerated. Any other unexpected
//! status fails the current Future, applies the configured
//! [`ErrorPolicy`] to the queue and releases the bus with a STOP.

mod policy;

use fastwire_hal::{TwiHardware, TwiStatus};

use crate::command::{Command, CommandQueue};
use crate::config::ErrorPolicy;
use crate::errors::I2cError;
use crate::future::{retire_command, FutureId, FutureRegistry, FutureSlot};
use crate::observer::{DebugStatus, I2cCallback, I2cObserver};

pub(crate) use policy::apply_policy;

/// Coarse bus state, as seen from outside the stepper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusPhase {
    /// No command in progress
    #[default]
    Idle,
    Start,
    /// SLA+R or SLA+W in progress
    Address,
    /// Data byte in progress
    Data,
    RepeatStart,
    Stop,
    /// The last command failed and nothing was queued after it
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Step {
    None,
    Start,
    RepeatStart,
    SlaW,
    SlaR,
    Send,
    Recv,
    RecvLast,
    Stop,
}

/// Everything a step may touch, borrowed for the duration of one interrupt
pub(crate) struct StepIo<'a, H, O: ?Sized, const Q: usize, const F: usize> {
    pub hw: &'a mut H,
    pub queue: &'a mut CommandQueue<Q>,
    pub registry: &'a mut FutureRegistry<FutureSlot, F>,
    pub observer: &'a O,
}

/// Interrupt-side state machine
#[derive(Debug)]
pub struct Stepper {
    policy: ErrorPolicy,
    step: Step,
    command: Option<Command>,
    /// Bytes left to transfer for the current command
    remaining: u8,
    expected: TwiStatus,
    faulted: bool,
}

impl Stepper {
    pub const fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            step: Step::None,
            command: None,
            remaining: 0,
            expected: TwiStatus::NO_INFO,
            faulted: false,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn phase(&self) -> BusPhase {
        match self.step {
            Step::None if self.faulted => BusPhase::Error,
            Step::None => BusPhase::Idle,
            Step::Start => BusPhase::Start,
            Step::RepeatStart => BusPhase::RepeatStart,
            Step::SlaW | Step::SlaR => BusPhase::Address,
            Step::Send | Step::Recv | Step::RecvLast => BusPhase::Data,
            Step::Stop => BusPhase::Stop,
        }
    }

    /// No command is executing
    pub fn is_idle(&self) -> bool {
        self.step == Step::None
    }

    /// Future of the command in progress
    pub fn current_future(&self) -> Option<FutureId> {
        self.command.map(|command| command.future_id)
    }

    /// Hardware status the phase in progress should end with
    pub fn expected_status(&self) -> TwiStatus {
        self.expected
    }

    /// Start the first queued command if the bus is idle
    pub(crate) fn kick_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
    ) {
        if self.is_idle() && !io.queue.empty_() {
            self.dequeue_(io, true);
        }
    }

    /// Handle one completed bus phase
    pub(crate) fn step_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
    ) -> I2cCallback {
        let Some(command) = self.command else {
            trace!("spurious TWI event");
            io.hw.idle();
            return I2cCallback::None;
        };

        let status = io.hw.status();
        io.observer.on_status(self.expected, status);
        if !self.status_ok(status) {
            return self.fail_(io, command, I2cError::from_status(status));
        }

        if matches!(self.step, Step::Recv | Step::RecvLast) {
            self.store_received_(io, &command);
        }

        match self.next_step(&command) {
            Step::SlaW => {
                io.observer.on_step(DebugStatus::Slaw, command.address_byte());
                self.enter(Step::SlaW, TwiStatus::SLA_W_TRANSMITTED_ACK);
                io.hw.send(command.address_byte());
            }
            Step::SlaR => {
                io.observer.on_step(DebugStatus::Slar, command.address_byte());
                self.enter(Step::SlaR, TwiStatus::SLA_R_TRANSMITTED_ACK);
                io.hw.send(command.address_byte());
            }
            Step::Send => self.send_(io, &command),
            Step::Recv => {
                io.observer.on_step(DebugStatus::Recv, 0);
                self.enter(Step::Recv, TwiStatus::DATA_RECEIVED_ACK);
                io.hw.receive(true);
            }
            Step::RecvLast => {
                io.observer.on_step(DebugStatus::RecvLast, 0);
                self.enter(Step::RecvLast, TwiStatus::DATA_RECEIVED_NACK);
                io.hw.receive(false);
            }
            Step::Stop => return self.complete_(io, command),
            Step::None | Step::Start | Step::RepeatStart => {
                io.hw.idle();
            }
        }
        I2cCallback::None
    }

    /// Abort the command in progress with `error`, as if the bus had
    /// reported a fault
    pub(crate) fn abort_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
        error: I2cError,
    ) -> I2cCallback {
        match self.command {
            Some(command) => self.fail_(io, command, error),
            None => I2cCallback::None,
        }
    }

    fn enter(&mut self, step: Step, expected: TwiStatus) {
        self.step = step;
        self.expected = expected;
    }

    fn status_ok(&self, status: TwiStatus) -> bool {
        status == self.expected
            || (self.expected == TwiStatus::DATA_TRANSMITTED_ACK
                && status == TwiStatus::DATA_TRANSMITTED_NACK
                && self.remaining == 0)
    }

    fn next_step(&self, command: &Command) -> Step {
        let next_read = |remaining: u8| match remaining {
            0 => Step::Stop,
            1 => Step::RecvLast,
            _ => Step::Recv,
        };
        match self.step {
            Step::Start | Step::RepeatStart if command.is_read() => Step::SlaR,
            Step::Start | Step::RepeatStart => Step::SlaW,
            Step::SlaR | Step::Recv => next_read(self.remaining),
            Step::RecvLast => Step::Stop,
            Step::SlaW | Step::Send if self.remaining > 0 => Step::Send,
            Step::SlaW | Step::Send => Step::Stop,
            Step::Stop | Step::None => Step::None,
        }
    }

    fn send_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
        command: &Command,
    ) {
        let chunk = io
            .registry
            .find_mut_(command.future_id)
            .and_then(FutureSlot::get_chunk_);
        let data = chunk.unwrap_or(0);
        io.observer.on_step(DebugStatus::Send, data);
        match chunk {
            Some(_) => io.observer.on_step(DebugStatus::SendOk, 0),
            None => {
                if let Some(slot) = io.registry.find_mut_(command.future_id) {
                    slot.set_error_(I2cError::IllegalSequence);
                }
                io.observer.on_step(DebugStatus::SendError, 0);
            }
        }
        self.remaining = self.remaining.saturating_sub(1);
        self.enter(Step::Send, TwiStatus::DATA_TRANSMITTED_ACK);
        io.hw.send(data);
    }

    fn store_received_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
        command: &Command,
    ) {
        let data = io.hw.data();
        let stored = match io.registry.find_mut_(command.future_id) {
            Some(slot) => {
                let stored = slot.set_chunk_(data);
                if !stored {
                    slot.set_error_(I2cError::IllegalSequence);
                }
                stored
            }
            None => false,
        };
        let event = if stored {
            DebugStatus::RecvOk
        } else {
            DebugStatus::RecvError
        };
        io.observer.on_step(event, data);
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn complete_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
        command: Command,
    ) -> I2cCallback {
        self.step = Step::Stop;
        if command.finish_future {
            if let Some(slot) = io.registry.find_mut_(command.future_id) {
                slot.set_finish_();
            }
        }
        retire_command(io.registry, command.future_id);

        if io.queue.empty_() {
            self.stop_(io);
        } else if command.force_stop {
            self.stop_(io);
            self.dequeue_(io, true);
        } else {
            self.dequeue_(io, false);
        }

        if command.end_transaction {
            I2cCallback::EndTransaction
        } else {
            I2cCallback::EndCommand
        }
    }

    fn fail_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
        command: Command,
        error: I2cError,
    ) -> I2cCallback {
        warn!(
            "i2c command failed: {} (future {=u8})",
            error,
            command.future_id.get()
        );
        if let Some(slot) = io.registry.find_mut_(command.future_id) {
            slot.set_error_(error);
        }
        retire_command(io.registry, command.future_id);
        let dropped = apply_policy(self.policy, command.future_id, io.queue, io.registry);
        if dropped > 0 {
            debug!("dropped {=usize} queued commands", dropped);
        }

        self.stop_(io);
        self.faulted = true;
        self.dequeue_(io, true);
        I2cCallback::Error
    }

    fn stop_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
    ) {
        io.observer.on_step(DebugStatus::Stop, 0);
        io.hw.stop();
        self.command = None;
        self.remaining = 0;
        self.enter(Step::None, TwiStatus::NO_INFO);
    }

    /// Start the next queued command, with a START (`first`) or a repeated
    /// START
    fn dequeue_<H: TwiHardware, O: I2cObserver + ?Sized, const Q: usize, const F: usize>(
        &mut self,
        io: &mut StepIo<'_, H, O, Q, F>,
        first: bool,
    ) {
        let Some(command) = io.queue.pull_() else {
            self.command = None;
            self.enter(Step::None, TwiStatus::NO_INFO);
            return;
        };
        self.command = Some(command);
        self.remaining = command.byte_count;
        self.faulted = false;
        if first {
            io.observer.on_step(DebugStatus::Start, 0);
            self.enter(Step::Start, TwiStatus::START_TRANSMITTED);
        } else {
            io.observer.on_step(DebugStatus::RepeatStart, 0);
            self.enter(Step::RepeatStart, TwiStatus::REPEAT_START_TRANSMITTED);
        }
        io.hw.start();
    }
}
