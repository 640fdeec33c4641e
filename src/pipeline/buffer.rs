//! Bounded batch buffer

use std::collections::VecDeque;

use crate::types::MetricPoint;

/// Pending points awaiting persistence, in insertion order
///
/// `push` hands back a full batch as soon as `batch_size` points are
/// queued; `take` captures whatever is queued. Both empty the buffer in the
/// same step, so no point is ever returned twice.
#[derive(Debug)]
pub struct BatchBuffer {
    pending: VecDeque<MetricPoint>,
    batch_size: usize,
    max_buffer: usize,
    dropped: u64,
}

impl BatchBuffer {
    pub fn new(batch_size: usize, max_buffer: usize) -> Self {
        let max_buffer = max_buffer.max(1);
        Self {
            pending: VecDeque::with_capacity(batch_size.min(max_buffer)),
            batch_size: batch_size.max(1),
            max_buffer,
            dropped: 0,
        }
    }

    /// Append a point, returning a drained batch when the size trigger fires
    ///
    /// When the buffer is at its cap the oldest points are dropped first.
    pub fn push(&mut self, point: MetricPoint) -> Option<Vec<MetricPoint>> {
        if self.pending.len() >= self.max_buffer {
            let excess = self.pending.len() + 1 - self.max_buffer;
            self.pending.drain(..excess);
            self.dropped += excess as u64;
        }
        self.pending.push_back(point);

        if self.pending.len() >= self.batch_size {
            self.take()
        } else {
            None
        }
    }

    /// Capture and clear the buffer; `None` when empty
    pub fn take(&mut self) -> Option<Vec<MetricPoint>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(Vec::from(std::mem::take(&mut self.pending)))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    /// Points discarded by the overflow cap since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(n: usize) -> MetricPoint {
        MetricPoint {
            id: format!("p{}", n),
            stream_key: "cpu".to_string(),
            value: n as f64,
            timestamp: Utc::now(),
            session_id: "s1".to_string(),
        }
    }

    #[test]
    fn test_size_trigger_returns_full_batch() {
        let mut buffer = BatchBuffer::new(3, 100);
        assert!(buffer.push(point(0)).is_none());
        assert!(buffer.push(point(1)).is_none());

        let batch = buffer.push(point(2)).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].id, "p0");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_empty_is_none() {
        let mut buffer = BatchBuffer::new(10, 100);
        assert!(buffer.take().is_none());
        buffer.push(point(0));
        assert_eq!(buffer.take().unwrap().len(), 1);
        assert!(buffer.take().is_none());
    }

    #[test]
    fn test_drained_batches_partition_input() {
        let mut buffer = BatchBuffer::new(4, 100);
        let mut drained = Vec::new();
        for n in 0..10 {
            if let Some(batch) = buffer.push(point(n)) {
                drained.extend(batch);
            }
            if n == 5 {
                drained.extend(buffer.take().unwrap_or_default());
            }
        }
        drained.extend(buffer.take().unwrap_or_default());

        let ids: Vec<String> = drained.iter().map(|p| p.id.clone()).collect();
        let expected: Vec<String> = (0..10).map(|n| format!("p{}", n)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut buffer = BatchBuffer::new(100, 3);
        for n in 0..5 {
            assert!(buffer.push(point(n)).is_none());
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.dropped(), 2);

        let batch = buffer.take().unwrap();
        let ids: Vec<&str> = batch.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p4"]);
    }
}
