//! Outbound frame queue between the bridge and the serial thread.
//!
//! Many producers, one consumer. Pushing never blocks.

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::protocol::Frame;

/// Producer handle. Clone freely.
#[derive(Clone, Debug)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

/// Consumer handle, owned by the transport
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: bool,
}

pub fn outbound_queue() -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundQueue { tx }, OutboundReceiver { rx, closed: false })
}

impl OutboundQueue {
    /// Encode and enqueue. Frames pushed after the transport is gone are dropped.
    pub fn push(&self, frame: Frame) {
        let bytes = frame.encode();
        tracing::trace!(msg_type = ?frame.msg_type(), len = bytes.len(), "Frame queued");
        if self.tx.send(bytes).is_err() {
            tracing::trace!("Outbound queue closed, frame dropped");
        }
    }

    /// Enqueue a batch back-to-back
    pub fn push_all(&self, frames: impl IntoIterator<Item = Frame>) {
        for frame in frames {
            self.push(frame);
        }
    }
}

impl OutboundReceiver {
    pub fn try_pop(&mut self) -> Option<Vec<u8>> {
        match self.rx.try_recv() {
            Ok(bytes) => Some(bytes),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Drop everything queued so far. Returns how many frames were discarded.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// True once every producer is gone and the queue has been drained
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages;

    #[test]
    fn test_fifo_order_across_producers() {
        let (queue, mut rx) = outbound_queue();
        let other = queue.clone();

        queue.push(messages::playback_state(1));
        other.push(messages::playback_state(2));
        queue.push(messages::playback_state(3));

        let codes: Vec<u8> = std::iter::from_fn(|| rx.try_pop()).map(|f| f[4]).collect();
        assert_eq!(codes, vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_discards_pending() {
        let (queue, mut rx) = outbound_queue();
        queue.push_all([messages::art_end(), messages::art_end()]);

        assert_eq!(rx.clear(), 2);
        assert!(rx.try_pop().is_none());
        assert!(!rx.is_closed());
    }

    #[test]
    fn test_closed_after_producers_drop() {
        let (queue, mut rx) = outbound_queue();
        queue.push(messages::art_end());
        drop(queue);

        assert!(rx.try_pop().is_some());
        assert!(!rx.is_closed());
        assert!(rx.try_pop().is_none());
        assert!(rx.is_closed());
    }

    #[test]
    fn test_push_after_receiver_dropped_is_silent() {
        let (queue, rx) = outbound_queue();
        drop(rx);
        queue.push(messages::art_end());
    }
}
