use super::command::Command;
use crate::core::{Reply, Result};
use async_trait::async_trait;

/// The store driver seam.
///
/// `Err` means the command never reached a usable store (transport failure);
/// command-level failures come back as `Reply::Error`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Executes one command.
    async fn execute(&self, command: &Command) -> Result<Reply>;

    /// Executes commands as one atomic unit, one reply per command.
    async fn execute_batch(&self, commands: &[Command]) -> Result<Vec<Reply>>;
}
