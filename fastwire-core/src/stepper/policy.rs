//! Queue handling after a bus fault

use crate::command::{Command, CommandQueue};
use crate::config::ErrorPolicy;
use crate::errors::I2cError;
use crate::future::{retire_command, FutureId, FutureRegistry, FutureSlot};

/// Drop the queued commands selected by `policy` after `failed` hit a fault
///
/// Each dropped command fails its Future with [`I2cError::Cancelled`]
/// (unless it already completed or failed) and is retired. Returns the
/// number of commands dropped.
pub(crate) fn apply_policy<const Q: usize, const F: usize>(
    policy: ErrorPolicy,
    failed: FutureId,
    queue: &mut CommandQueue<Q>,
    registry: &mut FutureRegistry<FutureSlot, F>,
) -> usize {
    let mut dropped = 0;
    let mut cancel = |command: Command| {
        if let Some(slot) = registry.find_mut_(command.future_id) {
            slot.set_error_(I2cError::Cancelled);
        }
        retire_command(registry, command.future_id);
        dropped += 1;
    };
    match policy {
        ErrorPolicy::DoNothing => {}
        ErrorPolicy::ClearAllCommands => queue.clear_(&mut cancel),
        ErrorPolicy::ClearTransactionCommands => queue.clear_future_(failed, &mut cancel),
    }
    dropped
}
