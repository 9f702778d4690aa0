//! Event types emitted by the loop

use uuid::Uuid;

use crate::domain::{Iteration, RalphTask};

/// An observable moment in a task's life
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// The task transitioned to running
    TaskStarted { task_id: Uuid },

    /// An iteration was recorded on the task
    IterationCompleted { task_id: Uuid, iteration: Box<Iteration> },

    /// The task reached a terminal state; carries the final task
    TaskCompleted { task: Box<RalphTask> },
}

impl TaskEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "TaskStarted",
            Self::IterationCompleted { .. } => "IterationCompleted",
            Self::TaskCompleted { .. } => "TaskCompleted",
        }
    }

    pub fn task_id(&self) -> Uuid {
        match self {
            Self::TaskStarted { task_id } => *task_id,
            Self::IterationCompleted { task_id, .. } => *task_id,
            Self::TaskCompleted { task } => task.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let id = Uuid::new_v4();
        assert_eq!(TaskEvent::TaskStarted { task_id: id }.event_type(), "TaskStarted");
        assert_eq!(TaskEvent::TaskStarted { task_id: id }.task_id(), id);
    }

    #[test]
    fn test_task_completed_carries_task() {
        let task = RalphTask::new("Something to work on", "");
        let id = task.id;
        let event = TaskEvent::TaskCompleted { task: Box::new(task) };
        assert_eq!(event.task_id(), id);
    }
}
