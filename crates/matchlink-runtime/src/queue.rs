//! The per-tick task queue
//!
//! The queue exclusively owns every in-flight [`AsyncTask`]. Once per tick it
//! accumulates elapsed time, polls each task's platform handle, force-fails
//! tasks past the orphan ceiling, and hands completed tasks back to the
//! caller for result processing. Completed tasks are removed before results
//! are processed, so processing may enqueue follow-on work freely.

use core::time::Duration;

use tracing::{debug, warn};

use matchlink_core::{
    CompletionCode, PlatformHandle, PlatformResponse, PlatformService, TaskId,
};

use crate::task::{AsyncTask, TaskKind};

// ----------------------------------------------------------------------------
// Finished Tasks
// ----------------------------------------------------------------------------

/// How a task left the queue
#[derive(Debug)]
pub enum TaskVerdict {
    /// The platform reported a terminal status
    Completed {
        code: CompletionCode,
        response: Option<PlatformResponse>,
    },
    /// The task exceeded the orphan ceiling; the platform-side operation may
    /// still be outstanding
    Orphaned { elapsed: Duration },
}

/// A task removed from the queue this tick, ready for result processing
#[derive(Debug)]
pub struct FinishedTask {
    pub task: AsyncTask,
    pub verdict: TaskVerdict,
}

// ----------------------------------------------------------------------------
// Task Queue
// ----------------------------------------------------------------------------

/// Ordered collection of in-flight tasks, ticked once per frame
#[derive(Debug)]
pub struct TaskQueue {
    tasks: Vec<AsyncTask>,
    next_id: u64,
    max_task_time: Option<Duration>,
}

impl TaskQueue {
    /// Create a queue with the given orphan ceiling (`None` disables it)
    pub fn new(max_task_time: Option<Duration>) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            max_task_time,
        }
    }

    /// Append a task for a pending platform operation
    pub fn enqueue(&mut self, handle: PlatformHandle, kind: TaskKind) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        debug!(task = %id, op = kind.op_name(), %handle, "task enqueued");
        self.tasks.push(AsyncTask::new(id, handle, kind));
        id
    }

    /// Advance every task by `delta`: poll for completion, force-fail
    /// orphans, and remove finished tasks. Returns the finished tasks in
    /// queue order.
    pub fn tick<P: PlatformService>(
        &mut self,
        delta: Duration,
        platform: &mut P,
    ) -> Vec<FinishedTask> {
        let mut finished = Vec::new();
        let mut index = 0;
        while index < self.tasks.len() {
            self.tasks[index].update_elapsed(delta);

            if let Some((code, response)) = self.tasks[index].poll(platform) {
                let task = self.tasks.remove(index);
                debug!(task = %task.id(), op = task.op_name(), %code, "task completed");
                finished.push(FinishedTask {
                    task,
                    verdict: TaskVerdict::Completed { code, response },
                });
                continue;
            }

            if self.tasks[index].is_orphaned(self.max_task_time) {
                let task = self.tasks.remove(index);
                let elapsed = task.elapsed();
                warn!(
                    task = %task.id(),
                    op = task.op_name(),
                    ?elapsed,
                    "task orphaned; platform-side operation may still be outstanding"
                );
                finished.push(FinishedTask {
                    task,
                    verdict: TaskVerdict::Orphaned { elapsed },
                });
                continue;
            }

            index += 1;
        }
        finished
    }

    /// Number of tasks still in flight
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue has no tasks in flight
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
