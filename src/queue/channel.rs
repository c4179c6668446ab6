//! Bounded per-group channel
//!
//! Each registered consumer group owns exactly one channel. The fan-out
//! publisher holds the writing half, the group's drain loop the reading half;
//! nobody else touches either end.

use crate::queue::message::Message;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Result of offering a message to one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Delivered,
    /// Channel was full and the caller chose not to wait
    Dropped,
    /// Reader is gone; the group has shut down
    Closed,
}

/// Result of a non-blocking pop
#[derive(Debug)]
pub(crate) enum Pop<T> {
    Item(Message<T>),
    Empty,
    Closed,
}

/// Writing half of a consumer group's channel
pub(crate) struct ConsumerChannel<T> {
    sender: mpsc::Sender<Message<T>>,
}

impl<T> Clone for ConsumerChannel<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Reading half, owned by the group's drain loop
pub(crate) struct ChannelReader<T> {
    receiver: mpsc::Receiver<Message<T>>,
}

impl<T> ConsumerChannel<T> {
    /// Create a channel holding at most `capacity` messages
    pub fn bounded(capacity: usize) -> (ConsumerChannel<T>, ChannelReader<T>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (ConsumerChannel { sender }, ChannelReader { receiver })
    }

    /// Offer a message, waiting while the channel is full
    pub async fn offer(&self, message: Message<T>) -> Offer {
        match self.sender.send(message).await {
            Ok(()) => Offer::Delivered,
            Err(_) => Offer::Closed,
        }
    }

    /// Offer a message without waiting
    pub fn try_offer(&self, message: Message<T>) -> Offer {
        match self.sender.try_send(message) {
            Ok(()) => Offer::Delivered,
            Err(TrySendError::Full(_)) => Offer::Dropped,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Messages currently buffered (including slots reserved by waiting writers)
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

impl<T> ChannelReader<T> {
    pub fn try_pop(&mut self) -> Pop<T> {
        match self.receiver.try_recv() {
            Ok(message) => Pop::Item(message),
            Err(TryRecvError::Empty) => Pop::Empty,
            Err(TryRecvError::Disconnected) => Pop::Closed,
        }
    }

    /// Refuse further writes; already buffered messages stay readable
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (writer, mut reader) = ConsumerChannel::bounded(4);
        for value in 1..=3 {
            assert_eq!(writer.offer(Message::new(value)).await, Offer::Delivered);
        }

        let mut popped = Vec::new();
        while let Pop::Item(message) = reader.try_pop() {
            popped.push(message.into_payload());
        }
        assert_eq!(popped, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_try_offer_drops_when_full() {
        let (writer, mut reader) = ConsumerChannel::bounded(2);
        assert_eq!(writer.try_offer(Message::new(1)), Offer::Delivered);
        assert_eq!(writer.try_offer(Message::new(2)), Offer::Delivered);
        assert_eq!(writer.try_offer(Message::new(3)), Offer::Dropped);
        assert_eq!(writer.len(), 2);
        assert_eq!(writer.capacity(), 2);

        assert!(matches!(reader.try_pop(), Pop::Item(m) if *m.payload() == 1));
        assert_eq!(writer.try_offer(Message::new(4)), Offer::Delivered);
    }

    #[tokio::test]
    async fn test_offer_waits_for_space() {
        let (writer, mut reader) = ConsumerChannel::bounded(1);
        writer.offer(Message::new("first")).await;

        let blocked_writer = writer.clone();
        let pending = tokio::spawn(async move { blocked_writer.offer(Message::new("second")).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished(), "Writer should wait while channel is full");

        assert!(matches!(reader.try_pop(), Pop::Item(_)));
        assert_eq!(pending.await.unwrap(), Offer::Delivered);
        assert!(matches!(reader.try_pop(), Pop::Item(m) if *m.payload() == "second"));
    }

    #[tokio::test]
    async fn test_close_keeps_buffered_items() {
        let (writer, mut reader) = ConsumerChannel::bounded(4);
        writer.offer(Message::new(1)).await;
        reader.close();

        assert_eq!(writer.try_offer(Message::new(2)), Offer::Closed);
        assert!(matches!(reader.try_pop(), Pop::Item(_)));
        assert!(matches!(reader.try_pop(), Pop::Closed));
    }

    #[tokio::test]
    async fn test_empty_versus_closed() {
        let (writer, mut reader) = ConsumerChannel::<u8>::bounded(1);
        assert!(matches!(reader.try_pop(), Pop::Empty));
        drop(writer);
        assert!(matches!(reader.try_pop(), Pop::Closed));
    }

    #[tokio::test]
    async fn test_offer_to_dropped_reader_reports_closed() {
        let (writer, reader) = ConsumerChannel::bounded(1);
        drop(reader);
        assert_eq!(writer.offer(Message::new(0)).await, Offer::Closed);
    }
}
