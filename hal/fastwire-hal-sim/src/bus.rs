//! Simulated TWI peripheral and bus
//!
//! [`SimBus`] plays both the wire and the slaves attached to it. Every bus
//! phase requested through [`SimTwi`] completes immediately: the status
//! register is updated, the TWINT flag is raised and, when interrupts are
//! enabled, an [`IsrEvent::Twint`] is posted for the interrupt thread.

use std::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use fastwire_hal::{I2cConfig, TwiHardware, TwiStatus};

use crate::isr::{IsrChannel, IsrEvent};
use crate::slave::SimSlave;

/// What happened on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    Start,
    RepeatStart,
    Address { address: u8, read: bool, ack: bool },
    Write { byte: u8, ack: bool },
    Read { byte: u8, ack: bool },
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wire {
    /// No START issued, or STOP since the last one
    Released,
    /// START sent, next byte is SLA+R/W
    Addressing,
    /// Slave `index` selected for reading or writing
    Selected { index: usize, read: bool },
    /// Address not acknowledged
    Unanswered,
}

struct BusState {
    enabled: bool,
    bit_rate: u8,
    interrupts: bool,
    pending: bool,
    status: TwiStatus,
    data: u8,
    wire: Wire,
    slaves: Vec<Box<dyn SimSlave>>,
    log: Vec<BusEvent>,
    injected: Option<TwiStatus>,
    hung: bool,
    phases: usize,
}

impl BusState {
    fn complete(&mut self, status: TwiStatus) {
        let status = match self.injected.take() {
            Some(injected) => {
                if injected == TwiStatus::ARBITRATION_LOST {
                    self.release_slave();
                    self.wire = Wire::Released;
                }
                injected
            }
            None => status,
        };
        self.status = status;
        self.pending = true;
        self.phases += 1;
    }

    fn release_slave(&mut self) {
        if let Wire::Selected { index, .. } = self.wire {
            if let Some(slave) = self.slaves.get_mut(index) {
                slave.on_stop();
            }
        }
    }

    fn start(&mut self) {
        self.pending = false;
        if self.hung {
            return;
        }
        let status = if self.wire == Wire::Released {
            self.log.push(BusEvent::Start);
            TwiStatus::START_TRANSMITTED
        } else {
            self.release_slave();
            self.log.push(BusEvent::RepeatStart);
            TwiStatus::REPEAT_START_TRANSMITTED
        };
        self.wire = Wire::Addressing;
        self.complete(status);
    }

    fn send(&mut self, byte: u8) {
        self.pending = false;
        if self.hung {
            return;
        }
        let status = match self.wire {
            Wire::Addressing => self.address(byte),
            Wire::Selected { index, read: false } => {
                let ack = self.slaves[index].on_write(byte);
                self.log.push(BusEvent::Write { byte, ack });
                if ack {
                    TwiStatus::DATA_TRANSMITTED_ACK
                } else {
                    TwiStatus::DATA_TRANSMITTED_NACK
                }
            }
            _ => TwiStatus::BUS_ERROR,
        };
        self.complete(status);
    }

    fn address(&mut self, byte: u8) -> TwiStatus {
        let address = byte >> 1;
        let read = byte & 0x01 != 0;
        let index = self
            .slaves
            .iter()
            .position(|slave| slave.address() == address);
        let ack = match index {
            Some(index) => self.slaves[index].on_address(read),
            None => false,
        };
        self.log.push(BusEvent::Address { address, read, ack });
        match (index, ack) {
            (Some(index), true) => {
                self.wire = Wire::Selected { index, read };
                if read {
                    TwiStatus::SLA_R_TRANSMITTED_ACK
                } else {
                    TwiStatus::SLA_W_TRANSMITTED_ACK
                }
            }
            _ => {
                self.wire = Wire::Unanswered;
                if read {
                    TwiStatus::SLA_R_TRANSMITTED_NACK
                } else {
                    TwiStatus::SLA_W_TRANSMITTED_NACK
                }
            }
        }
    }

    fn receive(&mut self, ack: bool) {
        self.pending = false;
        if self.hung {
            return;
        }
        let status = match self.wire {
            Wire::Selected { index, read: true } => {
                let byte = self.slaves[index].on_read();
                self.data = byte;
                self.log.push(BusEvent::Read { byte, ack });
                if ack {
                    TwiStatus::DATA_RECEIVED_ACK
                } else {
                    TwiStatus::DATA_RECEIVED_NACK
                }
            }
            _ => TwiStatus::BUS_ERROR,
        };
        self.complete(status);
    }

    fn stop(&mut self) {
        self.pending = false;
        if self.wire != Wire::Released {
            self.release_slave();
            self.log.push(BusEvent::Stop);
        }
        self.wire = Wire::Released;
    }
}

/// Simulated bus with its slaves
pub struct SimBus {
    state: Mutex<CriticalSectionRawMutex, RefCell<BusState>>,
    isr: IsrChannel,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    /// Empty bus, interrupts disabled
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(BusState {
                enabled: false,
                bit_rate: 0,
                interrupts: false,
                pending: false,
                status: TwiStatus::NO_INFO,
                data: 0,
                wire: Wire::Released,
                slaves: Vec::new(),
                log: Vec::new(),
                injected: None,
                hung: false,
                phases: 0,
            })),
            isr: IsrChannel::new(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// TWI peripheral driving this bus
    pub fn twi(&self) -> SimTwi<'_> {
        SimTwi { bus: self }
    }

    pub fn attach(&self, slave: impl SimSlave + 'static) {
        self.with(|state| state.slaves.push(Box::new(slave)));
    }

    /// Post an [`IsrEvent::Twint`] for every completed phase
    pub fn enable_interrupts(&self, enabled: bool) {
        self.with(|state| state.interrupts = enabled);
    }

    /// Event channel read by the interrupt thread
    pub fn isr_events(&self) -> &IsrChannel {
        &self.isr
    }

    /// Ask the interrupt thread to exit
    pub fn shutdown_isr(&self) {
        self.isr.try_send(IsrEvent::Shutdown).ok();
    }

    /// Report `status` for the next completed phase instead of the real one
    pub fn inject_status(&self, status: TwiStatus) {
        self.with(|state| state.injected = Some(status));
    }

    /// Stop completing phases (SCL held low)
    pub fn set_hung(&self, hung: bool) {
        self.with(|state| state.hung = hung);
    }

    pub fn is_enabled(&self) -> bool {
        self.with(|state| state.enabled)
    }

    /// TWBR value programmed by `begin`
    pub fn bit_rate(&self) -> u8 {
        self.with(|state| state.bit_rate)
    }

    /// Number of completed phases
    pub fn phases(&self) -> usize {
        self.with(|state| state.phases)
    }

    /// Wire events so far
    pub fn log(&self) -> Vec<BusEvent> {
        self.with(|state| state.log.clone())
    }

    pub fn clear_log(&self) {
        self.with(|state| state.log.clear());
    }

    fn phase<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        let (result, raise) = self.with(|state| {
            let result = f(state);
            (result, state.interrupts && state.pending)
        });
        if raise && self.isr.try_send(IsrEvent::Twint).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("simulated TWI interrupt lost");
        }
        result
    }
}

/// [`TwiHardware`] implementation on a [`SimBus`]
pub struct SimTwi<'b> {
    bus: &'b SimBus,
}

impl TwiHardware for SimTwi<'_> {
    fn begin(&mut self, config: &I2cConfig) {
        self.bus.with(|state| {
            state.enabled = true;
            state.bit_rate = config.bit_rate_register();
        });
    }

    fn end(&mut self) {
        self.bus.with(|state| state.enabled = false);
    }

    fn start(&mut self) {
        self.bus.phase(BusState::start);
    }

    fn send(&mut self, byte: u8) {
        self.bus.phase(|state| state.send(byte));
    }

    fn receive(&mut self, ack: bool) {
        self.bus.phase(|state| state.receive(ack));
    }

    fn stop(&mut self) {
        self.bus.with(BusState::stop);
    }

    fn idle(&mut self) {
        self.bus.with(|state| state.pending = false);
    }

    fn status(&self) -> TwiStatus {
        self.bus.with(|state| state.status)
    }

    fn data(&self) -> u8 {
        self.bus.with(|state| state.data)
    }

    fn event_pending(&self) -> bool {
        self.bus.with(|state| state.pending)
    }
}
