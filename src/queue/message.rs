//! Message envelope carried through consumer channels

use std::time::{Duration, SystemTime};

/// A published payload together with the time it entered the queue
///
/// One `Message` is created per publish call and cloned into every
/// consumer channel, so all groups observe the same enqueue timestamp.
///
/// # Example
///
/// ```rust
/// use smartqueue::queue::Message;
///
/// let message = Message::new("user-42".to_string());
/// assert_eq!(message.payload(), "user-42");
/// ```
#[derive(Debug, Clone)]
pub struct Message<T> {
    payload: T,
    enqueued_at: SystemTime,
}

impl<T> Message<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            enqueued_at: SystemTime::now(),
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn enqueued_at(&self) -> SystemTime {
        self.enqueued_at
    }

    /// Time spent waiting since the message was published
    pub fn age(&self) -> Duration {
        // Clock went backwards: report no wait rather than failing
        SystemTime::now()
            .duration_since(self.enqueued_at)
            .unwrap_or_default()
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_keeps_payload_and_timestamp() {
        let before = SystemTime::now();
        let message = Message::new(7u32);
        let after = SystemTime::now();

        assert_eq!(*message.payload(), 7);
        assert!(message.enqueued_at() >= before);
        assert!(message.enqueued_at() <= after);
    }

    #[test]
    fn test_cloned_messages_share_enqueue_time() {
        let message = Message::new("payload".to_string());
        let copy = message.clone();

        assert_eq!(message.enqueued_at(), copy.enqueued_at());
        assert_eq!(copy.into_payload(), "payload");
    }
}
