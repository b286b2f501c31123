//! Handles to scheduled processing passes.

use tokio::task::JoinHandle;

use crate::pipeline::PipelineError;

/// How a pass ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The result reached the receiver.
    Delivered,
    /// A newer pass was scheduled first; the result was dropped.
    Superseded,
    /// The receiver was told about this failure.
    Failed(PipelineError),
    /// Nothing to do: no window, no pipelines, or the channel is shut down.
    Idle,
}

/// Handle to a scheduled pass.
///
/// Dropping the handle does not cancel the pass.
#[derive(Debug)]
pub struct PassHandle {
    generation: u64,
    task: Option<JoinHandle<PassOutcome>>,
}

impl PassHandle {
    pub(crate) fn spawned(generation: u64, task: JoinHandle<PassOutcome>) -> Self {
        Self {
            generation,
            task: Some(task),
        }
    }

    pub(crate) fn idle(generation: u64) -> Self {
        Self {
            generation,
            task: None,
        }
    }

    /// Generation assigned to the pass.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if no work was scheduled.
    pub fn is_idle(&self) -> bool {
        self.task.is_none()
    }

    /// Wait for the pass to finish.
    pub async fn wait(self) -> PassOutcome {
        match self.task {
            None => PassOutcome::Idle,
            Some(task) => task
                .await
                .unwrap_or_else(|e| PassOutcome::Failed(PipelineError::TaskFailed(e.to_string()))),
        }
    }
}
