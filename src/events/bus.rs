//! EventBus - broadcast channel for task events

use tokio::sync::broadcast;
use tracing::debug;

use super::TaskEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcast bus for task lifecycle events
///
/// Emission is fire-and-forget: with no subscribers the event is dropped,
/// and a lagging subscriber loses old events rather than blocking the loop.
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: TaskEvent) {
        debug!(event_type = event.event_type(), task_id = %event.task_id(), "emitting event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Iteration;
    use uuid::Uuid;

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.emit(TaskEvent::TaskStarted { task_id: Uuid::new_v4() });
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.emit(TaskEvent::TaskStarted { task_id: id });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id(), id);
        assert_eq!(event.event_type(), "TaskStarted");
    }

    #[tokio::test]
    async fn test_all_subscribers_receive() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let id = Uuid::new_v4();
        bus.emit(TaskEvent::IterationCompleted {
            task_id: id,
            iteration: Box::new(Iteration::new(1)),
        });

        assert_eq!(rx1.recv().await.unwrap().task_id(), id);
        assert_eq!(rx2.recv().await.unwrap().task_id(), id);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.emit(TaskEvent::TaskStarted { task_id: id });
        for n in 1..=3 {
            bus.emit(TaskEvent::IterationCompleted {
                task_id: id,
                iteration: Box::new(Iteration::new(n)),
            });
        }

        assert_eq!(rx.recv().await.unwrap().event_type(), "TaskStarted");
        for expected in 1..=3u32 {
            match rx.recv().await.unwrap() {
                TaskEvent::IterationCompleted { iteration, .. } => {
                    assert_eq!(iteration.iteration_number, expected);
                }
                other => panic!("unexpected event: {}", other.event_type()),
            }
        }
    }
}
