//! Asynchronous task handles
//!
//! Mutating cluster operations return a task; callers poll it at a
//! fixed interval until it reaches a terminal state or the deadline
//! elapses.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::error::Error;
use crate::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub state: TaskState,
    /// Diagnostic attached by the fabric, meaningful on failure
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub progress: Option<u8>,
}

impl Task {
    /// Poll this task at `interval` until it completes or fails, or
    /// `timeout` elapses.
    ///
    /// A failed task always aborts with the remote-supplied message;
    /// it is never reported as success.
    pub async fn wait(&self, client: &Client, interval: Duration, timeout: Duration) -> Result<Task, Error> {
        let deadline = Instant::now() + timeout;
        let mut current = client.get_task(&self.id).await?;

        loop {
            match current.state {
                TaskState::Completed => return Ok(current),
                TaskState::Failed => {
                    return Err(Error::TaskFailed {
                        id: current.id,
                        message: current.message,
                    });
                }
                _ => {}
            }

            if Instant::now() + interval > deadline {
                return Err(Error::Timeout {
                    waited: timeout,
                    last: format!("task {} still {:?}", current.id, current.state),
                });
            }
            tokio::time::sleep(interval).await;
            current = client.get_task(&self.id).await?;
        }
    }
}

impl Client {
    pub async fn get_task(&self, id: &str) -> Result<Task, Error> {
        self.get_json(&format!("task/{}", id)).await
    }
}
