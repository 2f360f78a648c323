//! Bounded FIFO of pending commands
//!
//! Filled by client code inside a critical section, drained by the stepper
//! from the I2C interrupt. Like the registry, methods ending in `_` assume
//! the caller holds the critical section.

use heapless::Deque;

use super::Command;
use crate::future::FutureId;

pub struct CommandQueue<const Q: usize> {
    commands: Deque<Command, Q>,
}

impl<const Q: usize> Default for CommandQueue<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const Q: usize> CommandQueue<Q> {
    pub const fn new() -> Self {
        Self {
            commands: Deque::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        Q
    }

    /// Number of commands that can still be pushed
    pub fn free_(&self) -> usize {
        Q - self.commands.len()
    }

    pub fn len_(&self) -> usize {
        self.commands.len()
    }

    pub fn empty_(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append a command, giving it back if the queue is full
    pub fn push_(&mut self, command: Command) -> Result<(), Command> {
        self.commands.push_back(command)
    }

    /// Remove the oldest command
    pub fn pull_(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Oldest command, left in the queue
    pub fn peek_(&self) -> Option<&Command> {
        self.commands.front()
    }

    /// Remove every command; `retire` is called for each one, oldest first
    pub fn clear_(&mut self, mut retire: impl FnMut(Command)) {
        while let Some(command) = self.commands.pop_front() {
            retire(command);
        }
    }

    /// Remove the commands of `future_id` found at the head of the queue
    pub fn clear_future_(&mut self, future_id: FutureId, mut retire: impl FnMut(Command)) {
        while self
            .commands
            .front()
            .is_some_and(|command| command.future_id == future_id)
        {
            if let Some(command) = self.commands.pop_front() {
                retire(command);
            }
        }
    }
}
