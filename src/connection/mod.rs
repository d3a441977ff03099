pub mod backend;
pub mod command;
pub mod config;
pub mod memory;
pub mod pattern;
pub mod pool;

use crate::core::{Reply, Result, StoreError};
use backend::Backend;
use command::Command;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// A client connection to the store.
///
/// Supports single round trips through [`Connection::do_command`] and
/// pipelining through `send` / `flush` / `receive`. `MULTI` opens a
/// transaction block: later commands are queued and run together by `EXEC`.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    backend: Arc<dyn Backend>,
    state: ConnectionState,
    /// Commands written by `send` and not yet flushed
    outgoing: Vec<Command>,
    /// Replies received by `flush` and not yet read
    pending: VecDeque<Reply>,
    /// Commands queued inside MULTI
    queued: Vec<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

impl Connection {
    pub(crate) fn new(id: u64, backend: Arc<dyn Backend>) -> Self {
        Self {
            id,
            backend,
            state: ConnectionState::Active,
            outgoing: Vec::new(),
            pending: VecDeque::new(),
            queued: Vec::new(),
        }
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Writes the command to the output buffer.
    pub fn send(&mut self, command: Command) -> Result<()> {
        self.ensure_open()?;
        trace!(connection = self.id, %command, "send");
        self.outgoing.push(command);
        Ok(())
    }

    /// Delivers buffered commands to the store and collects their replies.
    ///
    /// A transport failure closes the connection; buffered commands after
    /// the failing one are dropped.
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        let outgoing = std::mem::take(&mut self.outgoing);
        for command in outgoing {
            match self.dispatch(command).await {
                Ok(reply) => self.pending.push_back(reply),
                Err(err) => {
                    self.close();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Reads the oldest pending reply, flushing first when nothing is pending.
    pub async fn receive(&mut self) -> Result<Reply> {
        if self.pending.is_empty() && !self.outgoing.is_empty() {
            self.flush().await?;
        }
        self.pending
            .pop_front()
            .ok_or_else(|| StoreError::transport("no pending reply to receive"))
    }

    /// Sends `command`, flushes, and returns its reply.
    ///
    /// Replies of earlier pipelined commands are consumed; the first error
    /// among them or the command's own reply is returned as `Err`.
    pub async fn do_command(&mut self, command: Command) -> Result<Reply> {
        self.send(command)?;
        self.flush().await?;

        let mut first_error = None;
        let mut last = Reply::Nil;
        while let Some(reply) = self.pending.pop_front() {
            if let Reply::Error(message) = &reply {
                first_error.get_or_insert_with(|| message.clone());
            }
            last = reply;
        }

        match first_error {
            Some(message) => Err(StoreError::Transport(message)),
            None => Ok(last),
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Reply> {
        match (self.state, command) {
            (ConnectionState::InTransaction, Command::Multi) => {
                Ok(Reply::Error("ERR MULTI calls can not be nested".to_string()))
            }
            (_, Command::Multi) => {
                self.state = ConnectionState::InTransaction;
                Ok(Reply::ok())
            }
            (ConnectionState::InTransaction, Command::Exec) => {
                let queued = std::mem::take(&mut self.queued);
                self.state = ConnectionState::Active;
                let replies = self.backend.execute_batch(&queued).await?;
                Ok(Reply::Array(replies))
            }
            (ConnectionState::InTransaction, Command::Discard) => {
                self.queued.clear();
                self.state = ConnectionState::Active;
                Ok(Reply::ok())
            }
            (_, command @ (Command::Exec | Command::Discard)) => Ok(Reply::Error(format!(
                "ERR {} without MULTI",
                command.name()
            ))),
            (ConnectionState::InTransaction, command) => {
                self.queued.push(command);
                Ok(Reply::Status("QUEUED".to_string()))
            }
            (_, command) => self.backend.execute(&command).await,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(StoreError::transport("connection is closed"));
        }
        Ok(())
    }

    /// Check if connection is inside MULTI
    pub fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }

    /// Check if connection is active
    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    /// True when commands or replies are still buffered.
    pub fn has_pending(&self) -> bool {
        !self.outgoing.is_empty() || !self.pending.is_empty()
    }

    /// Close the connection, discarding buffered commands, replies and any
    /// open transaction.
    pub fn close(&mut self) {
        self.outgoing.clear();
        self.pending.clear();
        self.queued.clear();
        self.state = ConnectionState::Closed;
    }
}
