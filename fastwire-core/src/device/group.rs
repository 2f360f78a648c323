//! Futures groups
//!
//! A [`FuturesGroup`] launches a sequence of transactions on one device,
//! each one only after the previous one ended READY, and reports a single
//! status for the whole sequence. Typical use is a device initialization
//! made of several register writes.
//!
//! In asynchronous mode the group advances when the manager reports a
//! Future change to it, so the interrupt must be served with
//! [`I2cManager::on_interrupt_with`] and the group as listener. In
//! synchronous mode every launch returns with its transaction over and
//! [`FuturesGroup::start`] runs the whole sequence.
//!
//! [`I2cManager::on_interrupt_with`]: crate::manager::I2cManager::on_interrupt_with

use core::cell::RefCell;

use super::registers::WriteRegisterFuture;
use super::I2cDevice;
use crate::command::I2cFinish;
use crate::errors::I2cError;
use crate::future::{Future, FutureId, FutureListener, FutureStatus, Payload};

/// A Future that can take part in a [`FuturesGroup`]
pub trait GroupMember<'m> {
    /// Launch the member on `device`; `last` forces a STOP at its end
    fn launch_member(&mut self, device: &I2cDevice<'m>, last: bool) -> Result<(), I2cError>;

    fn member_id(&self) -> Option<FutureId>;

    fn member_status(&self) -> FutureStatus;

    fn member_error(&self) -> Option<I2cError>;
}

/// Writes the whole input (if any), then reads the whole output (if any)
impl<'m, OUT: Payload, IN: Payload> GroupMember<'m> for Future<'m, OUT, IN> {
    fn launch_member(&mut self, device: &I2cDevice<'m>, last: bool) -> Result<(), I2cError> {
        let finish = if last {
            I2cFinish::FORCE_STOP
        } else {
            I2cFinish::empty()
        };
        if IN::SIZE > 0 && OUT::SIZE > 0 {
            device.launch_commands(
                self,
                &[
                    I2cDevice::write(0, I2cFinish::empty()),
                    I2cDevice::read(0, finish),
                ],
            )
        } else if OUT::SIZE > 0 {
            device.launch_commands(self, &[I2cDevice::read(0, finish)])
        } else {
            device.launch_commands(self, &[I2cDevice::write(0, finish)])
        }
    }

    fn member_id(&self) -> Option<FutureId> {
        self.id()
    }

    fn member_status(&self) -> FutureStatus {
        self.status()
    }

    fn member_error(&self) -> Option<I2cError> {
        self.error()
    }
}

/// Ordered steps of a [`FuturesGroup`]
///
/// `id`, `status` and `error` are only asked about the step launched last.
pub trait GroupSteps<'m> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn launch(
        &mut self,
        index: usize,
        device: &I2cDevice<'m>,
        last: bool,
    ) -> Result<(), I2cError>;

    fn id(&self, index: usize) -> Option<FutureId>;

    fn status(&self, index: usize) -> FutureStatus;

    fn error(&self, index: usize) -> Option<I2cError>;
}

/// Distinct Futures, launched in array order
impl<'g, 'm, const N: usize> GroupSteps<'m> for [&'g mut dyn GroupMember<'m>; N] {
    fn len(&self) -> usize {
        N
    }

    fn launch(
        &mut self,
        index: usize,
        device: &I2cDevice<'m>,
        last: bool,
    ) -> Result<(), I2cError> {
        self.get_mut(index)
            .ok_or(I2cError::Invalid)?
            .launch_member(device, last)
    }

    fn id(&self, index: usize) -> Option<FutureId> {
        self.get(index)?.member_id()
    }

    fn status(&self, index: usize) -> FutureStatus {
        self.get(index)
            .map_or(FutureStatus::Invalid, |member| member.member_status())
    }

    fn error(&self, index: usize) -> Option<I2cError> {
        self.get(index)?.member_error()
    }
}

/// Sequence of 8-bit register writes sharing one Future
///
/// The Future is re-armed with the next `(register, value)` pair before
/// each launch, so the whole sequence uses a single registry slot.
pub struct RegisterWrites<'s, 'm> {
    writes: &'s [(u8, u8)],
    future: WriteRegisterFuture<'m, u8>,
}

impl<'s> RegisterWrites<'s, '_> {
    pub fn new(writes: &'s [(u8, u8)]) -> Self {
        Self {
            writes,
            future: WriteRegisterFuture::new((0, 0)),
        }
    }

    pub fn writes(&self) -> &'s [(u8, u8)] {
        self.writes
    }
}

impl<'m> GroupSteps<'m> for RegisterWrites<'_, 'm> {
    fn len(&self) -> usize {
        self.writes.len()
    }

    fn launch(
        &mut self,
        index: usize,
        device: &I2cDevice<'m>,
        last: bool,
    ) -> Result<(), I2cError> {
        let write = *self.writes.get(index).ok_or(I2cError::Invalid)?;
        self.future.reset_(write)?;
        self.future.launch_member(device, last)
    }

    fn id(&self, _index: usize) -> Option<FutureId> {
        self.future.id()
    }

    fn status(&self, _index: usize) -> FutureStatus {
        self.future.status()
    }

    fn error(&self, _index: usize) -> Option<I2cError> {
        self.future.error()
    }
}

struct GroupState<S> {
    steps: S,
    /// Step launched last
    current: Option<usize>,
    status: FutureStatus,
    error: Option<I2cError>,
}

impl<'m, S: GroupSteps<'m>> GroupState<S> {
    fn fail(&mut self, error: I2cError) {
        warn!("futures group failed: {}", error);
        self.status = FutureStatus::Error;
        self.error = Some(error);
    }

    fn advance_(&mut self, device: &I2cDevice<'m>) {
        while self.status == FutureStatus::NotReady {
            if let Some(index) = self.current {
                match self.steps.status(index) {
                    FutureStatus::NotReady => return,
                    FutureStatus::Ready => {}
                    FutureStatus::Error | FutureStatus::Invalid => {
                        let error = self.steps.error(index).unwrap_or(I2cError::Invalid);
                        self.fail(error);
                        return;
                    }
                }
            }

            let next = self.current.map_or(0, |index| index + 1);
            let len = self.steps.len();
            if next >= len {
                trace!("futures group done after {=usize} steps", len);
                self.status = FutureStatus::Ready;
                return;
            }
            self.current = Some(next);
            if let Err(error) = self.steps.launch(next, device, next + 1 == len) {
                self.fail(error);
            }
        }
    }
}

/// Sequence of transactions on one device with one aggregate status
///
/// The status is INVALID before [`start`](Self::start), NOT_READY while
/// steps remain, READY once every step ended READY and ERROR as soon as one
/// step fails; later steps are then never launched.
pub struct FuturesGroup<'m, S> {
    device: I2cDevice<'m>,
    state: critical_section::Mutex<RefCell<GroupState<S>>>,
}

impl<'m, S: GroupSteps<'m>> FuturesGroup<'m, S> {
    pub fn new(device: I2cDevice<'m>, steps: S) -> Self {
        Self {
            device,
            state: critical_section::Mutex::new(RefCell::new(GroupState {
                steps,
                current: None,
                status: FutureStatus::Invalid,
                error: None,
            })),
        }
    }

    /// Launch the first step
    ///
    /// Fails with [`I2cError::Busy`] while the group is running. A failure
    /// to launch the first step is reported through [`error`](Self::error).
    pub fn start(&self) -> Result<(), I2cError> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.status == FutureStatus::NotReady {
                return Err(I2cError::Busy);
            }
            state.current = None;
            state.status = FutureStatus::NotReady;
            state.error = None;
            state.advance_(&self.device);
            Ok(())
        })
    }

    pub fn status(&self) -> FutureStatus {
        critical_section::with(|cs| self.state.borrow_ref(cs).status)
    }

    /// Error of the failed step, if the status is ERROR
    pub fn error(&self) -> Option<I2cError> {
        critical_section::with(|cs| self.state.borrow_ref(cs).error)
    }

    /// Spin until the group is over and return its final status
    pub fn wait(&self) -> FutureStatus {
        loop {
            let status = self.status();
            if status != FutureStatus::NotReady {
                return status;
            }
            core::hint::spin_loop();
        }
    }

    /// Give the steps back, e.g. to read member results
    pub fn into_steps(self) -> S {
        self.state.into_inner().into_inner().steps
    }
}

impl<'m, S: GroupSteps<'m>> FutureListener for FuturesGroup<'m, S> {
    fn on_status_change(&self, id: FutureId, _status: FutureStatus) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let Some(current) = state.current else {
                return;
            };
            if state.steps.id(current) == Some(id) {
                state.advance_(&self.device);
            }
        });
    }
}
