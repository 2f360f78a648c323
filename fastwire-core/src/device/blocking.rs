//! `embedded-hal` blocking I2C on top of the engine
//!
//! Lets existing `embedded-hal` drivers share the bus with Future-based
//! code: each transaction is queued like any other and the call spins
//! until it is over.

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};
use heapless::Vec;

use super::shifted_address;
use crate::command::{validate_commands, CommandKind, I2cFinish, LightCommand};
use crate::errors::I2cError;
use crate::future::{FutureId, FutureStatus, FutureStore, MAX_PAYLOAD_SIZE};
use crate::manager::{CommandSink, Launch};

/// Maximum number of direction changes in one transaction
pub const MAX_OPERATIONS: usize = 16;

/// Blocking `embedded_hal::i2c::I2c` implementation
///
/// Adjacent operations in the same direction are merged into one command,
/// so they are not separated by a repeated START. The bytes of a
/// transaction are limited to 255 in each direction. An empty write is only
/// accepted when no other operation writes bytes, and reads must move at
/// least one byte.
pub struct BlockingI2c<'m> {
    sink: &'m dyn CommandSink,
}

impl<'m> BlockingI2c<'m> {
    pub fn new(sink: &'m dyn CommandSink) -> Self {
        Self { sink }
    }
}

impl ErrorType for BlockingI2c<'_> {
    type Error = I2cError;
}

impl I2c<SevenBitAddress> for BlockingI2c<'_> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let target = shifted_address(address)?;

        let mut input: Vec<u8, MAX_PAYLOAD_SIZE> = Vec::new();
        let mut commands: Vec<LightCommand, MAX_OPERATIONS> = Vec::new();
        let mut output_size = 0usize;
        for operation in operations.iter() {
            let (kind, len) = match operation {
                Operation::Write(bytes) => {
                    input
                        .extend_from_slice(bytes)
                        .map_err(|_| I2cError::Invalid)?;
                    (CommandKind::Write, bytes.len())
                }
                Operation::Read(buffer) => {
                    output_size += buffer.len();
                    (CommandKind::Read, buffer.len())
                }
            };
            let len = u8::try_from(len).map_err(|_| I2cError::Invalid)?;
            match commands.last_mut() {
                Some(last) if last.kind == kind => {
                    last.byte_count = last.byte_count.checked_add(len).ok_or(I2cError::Invalid)?;
                }
                _ => commands
                    .push(LightCommand {
                        kind,
                        byte_count: len,
                        finish: I2cFinish::empty(),
                    })
                    .map_err(|_| I2cError::Invalid)?,
            }
        }
        validate_commands(&commands, input.len(), output_size)?;

        let id = self.sink.launch(Launch {
            target,
            rearmed: None,
            input: &input,
            output_size,
            commands: &commands,
        })?;
        let store = self.sink.futures();
        let result = collect(store, id, operations, output_size);
        store.release(id);
        result
    }
}

/// Wait for `id` and scatter its output over the read operations
fn collect(
    store: &dyn FutureStore,
    id: FutureId,
    operations: &mut [Operation<'_>],
    output_size: usize,
) -> Result<(), I2cError> {
    let status = loop {
        match store.status(id) {
            FutureStatus::NotReady => core::hint::spin_loop(),
            status => break status,
        }
    };
    if status != FutureStatus::Ready {
        return Err(store.error(id).unwrap_or(I2cError::Invalid));
    }

    let mut raw = [0u8; MAX_PAYLOAD_SIZE];
    if !store.take_output(id, &mut raw[..output_size]) {
        return Err(I2cError::Invalid);
    }
    let mut received = &raw[..output_size];
    for operation in operations.iter_mut() {
        if let Operation::Read(buffer) = operation {
            let (chunk, rest) = received.split_at(buffer.len());
            buffer.copy_from_slice(chunk);
            received = rest;
        }
    }
    Ok(())
}
