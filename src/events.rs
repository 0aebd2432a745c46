//! Drive events and their fan-out to subscribers.
//!
//! Observers (status displays, loggers, tests) call
//! [`SharedDrive::subscribe`](crate::services::SharedDrive::subscribe) and
//! receive [`DriveEvent`]s on a plain `std::sync::mpsc` channel. Publishing
//! never blocks; a subscriber whose receiver was dropped is pruned on the next
//! publish.
//!
//! ```rust
//! use vfd_sim::events::{DriveEvent, EventBus};
//! use vfd_sim::OperatingState;
//!
//! let mut bus = EventBus::new();
//! let rx = bus.subscribe();
//! bus.publish(DriveEvent::StateChanged {
//!     from: OperatingState::Ready,
//!     to: OperatingState::Accelerating,
//! });
//! assert!(matches!(rx.try_recv(), Ok(DriveEvent::StateChanged { .. })));
//! ```

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::alarm::AlarmRecord;
use crate::drive::OperatingState;

/// Something observable happened to the drive.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum DriveEvent {
    /// Operating state changed.
    StateChanged {
        /// Previous state.
        from: OperatingState,
        /// New state.
        to: OperatingState,
    },
    /// An alarm code became active.
    AlarmRaised(AlarmRecord),
    /// A reset cleared at least one active alarm.
    AlarmsCleared,
}

/// Subscriber list.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<DriveEvent>>,
}

impl EventBus {
    /// No subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<DriveEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&mut self, event: DriveEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(DriveEvent::AlarmsCleared);
        assert_eq!(a.try_recv(), Ok(DriveEvent::AlarmsCleared));
        assert_eq!(b.try_recv(), Ok(DriveEvent::AlarmsCleared));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(DriveEvent::AlarmsCleared);
        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn publish_without_subscribers() {
        let mut bus = EventBus::new();
        bus.publish(DriveEvent::AlarmsCleared);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
