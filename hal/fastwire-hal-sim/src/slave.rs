//! Simulated I2C slaves

use std::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// A device answering on the simulated bus
pub trait SimSlave: Send {
    /// 7-bit address
    fn address(&self) -> u8;

    /// Addressed by the master; returns whether to ACK
    fn on_address(&mut self, _read: bool) -> bool {
        true
    }

    /// Byte written by the master; returns whether to ACK
    fn on_write(&mut self, byte: u8) -> bool;

    /// Byte requested by the master
    fn on_read(&mut self) -> u8;

    /// The access ended with a STOP or a repeated START
    fn on_stop(&mut self) {}
}

/// 256 registers shared between a [`RegisterSlave`] and the test code
pub struct RegisterFile {
    registers: Mutex<CriticalSectionRawMutex, RefCell<[u8; 256]>>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            registers: Mutex::new(RefCell::new([0; 256])),
        }
    }
}

impl RegisterFile {
    pub fn get(&self, register: u8) -> u8 {
        self.registers
            .lock(|registers| registers.borrow()[usize::from(register)])
    }

    pub fn set(&self, register: u8, value: u8) {
        self.registers
            .lock(|registers| registers.borrow_mut()[usize::from(register)] = value);
    }
}

/// Register-based device
///
/// The first byte of each write selects the register; following bytes are
/// stored from there on. Reads return registers starting at the selected
/// one. The register pointer auto-increments and wraps at 0xFF.
pub struct RegisterSlave {
    address: u8,
    registers: Arc<RegisterFile>,
    pointer: u8,
    /// Next written byte is the register address
    selecting: bool,
    /// Data bytes ACKed in the current write before NACKing
    nack_after: Option<usize>,
    written: usize,
    present: bool,
}

impl RegisterSlave {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: Arc::new(RegisterFile::default()),
            pointer: 0,
            selecting: false,
            nack_after: None,
            written: 0,
            present: true,
        }
    }

    /// Builder-style register preset
    pub fn with_register(self, register: u8, value: u8) -> Self {
        self.registers.set(register, value);
        self
    }

    /// NACK data bytes once `count` bytes (register address included)
    /// have been written in one access
    pub fn nack_data_after(mut self, count: usize) -> Self {
        self.nack_after = Some(count);
        self
    }

    /// Device that never acknowledges its address
    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    /// Handle on the register contents
    pub fn registers(&self) -> Arc<RegisterFile> {
        Arc::clone(&self.registers)
    }
}

impl SimSlave for RegisterSlave {
    fn address(&self) -> u8 {
        self.address
    }

    fn on_address(&mut self, read: bool) -> bool {
        self.selecting = !read;
        self.written = 0;
        self.present
    }

    fn on_write(&mut self, byte: u8) -> bool {
        if self.selecting {
            self.pointer = byte;
            self.selecting = false;
        } else {
            self.registers.set(self.pointer, byte);
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.written += 1;
        self.nack_after.map_or(true, |limit| self.written < limit)
    }

    fn on_read(&mut self) -> u8 {
        let value = self.registers.get(self.pointer);
        self.pointer = self.pointer.wrapping_add(1);
        value
    }

    fn on_stop(&mut self) {
        self.selecting = false;
    }
}
