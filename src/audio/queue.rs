use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::AudioFrame;

/// Bounded frame handoff between the capture callback and the analysis thread.
///
/// The producer never blocks: when the queue is full it evicts the oldest
/// queued frame through its own receiver handle and counts the drop.
pub fn frame_queue(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let producer = FrameProducer {
        sender,
        evict: receiver.clone(),
        dropped: Arc::clone(&dropped),
    };
    let consumer = FrameConsumer { receiver, dropped };

    (producer, consumer)
}

pub struct FrameProducer {
    sender: Sender<AudioFrame>,
    evict: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameProducer {
    /// Queue a frame, dropping the oldest unconsumed one if full.
    pub fn push(&self, frame: AudioFrame) {
        let mut frame = frame;
        let mut retried = false;
        loop {
            match self.sender.try_send(frame) {
                Ok(()) => return,
                // The consumer may have freed a slot since the first attempt
                Err(TrySendError::Full(rejected)) if !retried => {
                    retried = true;
                    frame = rejected;
                }
                Err(TrySendError::Full(rejected)) => {
                    retried = false;
                    if self.evict.try_recv().is_ok() {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if total.is_power_of_two() {
                            warn!("Analysis falling behind, {} frames dropped so far", total);
                        }
                    }
                    frame = rejected;
                }
                // Unreachable while `evict` is alive, kept for exhaustiveness
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct FrameConsumer {
    receiver: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameConsumer {
    /// Wait up to `timeout` for the next frame. `Ok(None)` on timeout,
    /// `Err` once every producer is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<AudioFrame>, RecvTimeoutError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn try_recv(&self) -> Option<AudioFrame> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u64) -> AudioFrame {
        AudioFrame::new(index, 44100.0, vec![0.0; 4])
    }

    #[test]
    fn test_frames_arrive_in_order() {
        let (producer, consumer) = frame_queue(4);
        for i in 0..3 {
            producer.push(frame(i));
        }
        let indices: Vec<u64> = std::iter::from_fn(|| consumer.try_recv()).map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(consumer.dropped(), 0);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let (producer, consumer) = frame_queue(3);
        for i in 0..5 {
            producer.push(frame(i));
        }

        assert_eq!(producer.dropped(), 2);
        assert_eq!(consumer.dropped(), 2);
        let indices: Vec<u64> = std::iter::from_fn(|| consumer.try_recv()).map(|f| f.index).collect();
        assert_eq!(indices, vec![2, 3, 4]);
    }

    #[test]
    fn test_freed_slot_is_reused_without_a_drop() {
        let (producer, consumer) = frame_queue(2);
        producer.push(frame(0));
        producer.push(frame(1));
        assert_eq!(consumer.try_recv().map(|f| f.index), Some(0));

        producer.push(frame(2));
        assert_eq!(producer.dropped(), 0);
        let indices: Vec<u64> = std::iter::from_fn(|| consumer.try_recv()).map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_concurrent_drain_never_loses_a_consumed_frame() {
        let (producer, consumer) = frame_queue(2);
        let handle = std::thread::spawn(move || {
            for i in 0..2000 {
                producer.push(frame(i));
            }
        });

        let mut received = Vec::new();
        while let Ok(next) = consumer.recv_timeout(Duration::from_millis(50)) {
            if let Some(f) = next {
                received.push(f.index);
            }
        }
        handle.join().unwrap();

        // Every frame is either consumed or counted as dropped, in order
        assert_eq!(received.len() as u64 + consumer.dropped(), 2000);
        assert!(received.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(received.last(), Some(&1999));
    }

    #[test]
    fn test_recv_timeout_when_empty() {
        let (_producer, consumer) = frame_queue(2);
        let result = consumer.recv_timeout(Duration::from_millis(5)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_producer_across_threads() {
        let (producer, consumer) = frame_queue(2);
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                producer.push(frame(i));
            }
        });
        handle.join().unwrap();

        // Producer gone: the last frames are still readable, then disconnect
        let mut last = None;
        while let Ok(Some(f)) = consumer.recv_timeout(Duration::from_millis(5)) {
            last = Some(f.index);
        }
        assert_eq!(last, Some(99));
        assert_eq!(consumer.dropped(), 98);
        assert!(consumer.recv_timeout(Duration::from_millis(5)).is_err());
    }
}
