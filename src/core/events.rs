use crate::bodies::ObjectId;
use crate::core::ContactPoint;
use std::collections::VecDeque;

/// A contact between two objects, produced during a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// The first object of the pair
    pub object_a: ObjectId,

    /// The second object of the pair
    pub object_b: ObjectId,

    /// The contact point reported by the kernel
    pub contact: ContactPoint,
}

impl CollisionEvent {
    /// Creates a new collision event
    pub fn new(object_a: ObjectId, object_b: ObjectId, contact: ContactPoint) -> Self {
        Self {
            object_a,
            object_b,
            contact,
        }
    }

    /// Returns whether the event involves the given object
    pub fn involves(&self, object: ObjectId) -> bool {
        self.object_a == object || self.object_b == object
    }

    /// Returns the other object of the pair, if `object` is one of them
    pub fn other(&self, object: ObjectId) -> Option<ObjectId> {
        if self.object_a == object {
            Some(self.object_b)
        } else if self.object_b == object {
            Some(self.object_a)
        } else {
            None
        }
    }
}

/// FIFO of collision events waiting for delivery.
///
/// Delivered events go back to a pool and their slots are reused by the next
/// step, so a space in steady state does not allocate per contact.
#[derive(Debug, Default)]
pub struct EventQueue {
    /// Events not yet delivered, oldest first
    pending: VecDeque<CollisionEvent>,

    /// Delivered events kept for reuse
    pool: Vec<CollisionEvent>,
}

impl EventQueue {
    /// Creates a new empty event queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event, reusing a pooled slot when one is available
    pub fn push(&mut self, object_a: ObjectId, object_b: ObjectId, contact: ContactPoint) {
        let event = match self.pool.pop() {
            Some(mut recycled) => {
                recycled.object_a = object_a;
                recycled.object_b = object_b;
                recycled.contact = contact;
                recycled
            }
            None => CollisionEvent::new(object_a, object_b, contact),
        };
        self.pending.push_back(event);
    }

    /// Takes the oldest pending event
    pub fn pop(&mut self) -> Option<CollisionEvent> {
        self.pending.pop_front()
    }

    /// Returns a delivered event to the pool
    pub fn recycle(&mut self, event: CollisionEvent) {
        self.pool.push(event);
    }

    /// Returns the number of pending events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns whether there are no pending events
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the number of events available for reuse
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Drops all pending events, moving them to the pool
    pub fn clear(&mut self) {
        self.pool.extend(self.pending.drain(..));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_come_out_in_order() {
        let mut queue = EventQueue::new();
        queue.push(ObjectId(1), ObjectId(2), ContactPoint::default());
        queue.push(ObjectId(3), ObjectId(4), ContactPoint::default());

        assert_eq!(queue.pop().map(|e| e.object_a), Some(ObjectId(1)));
        assert_eq!(queue.pop().map(|e| e.object_a), Some(ObjectId(3)));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn recycled_events_are_reused() {
        let mut queue = EventQueue::new();
        queue.push(ObjectId(1), ObjectId(2), ContactPoint::default());
        let event = queue.pop().unwrap();
        queue.recycle(event);
        assert_eq!(queue.pooled(), 1);

        queue.push(ObjectId(5), ObjectId(6), ContactPoint::default());
        assert_eq!(queue.pooled(), 0);
        assert_eq!(queue.pop().and_then(|e| e.other(ObjectId(5))), Some(ObjectId(6)));
    }
}
