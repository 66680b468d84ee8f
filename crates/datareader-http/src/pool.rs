//! Reusable byte buffers for draining response bodies.

use std::sync::Mutex;

/// Default number of idle buffers kept by a pool.
const DEFAULT_MAX_IDLE: usize = 16;

/// Initial capacity of a freshly allocated buffer.
const INITIAL_CAPACITY: usize = 32 * 1024;

/// Buffers larger than this are dropped instead of pooled.
const MAX_POOLED_CAPACITY: usize = 4 * 1024 * 1024;

/// A pool of byte buffers.
///
/// Construct one and hand it to every client that should share it; there is
/// no process-wide instance. Only throughput depends on it.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

impl BufferPool {
    /// Create a pool keeping at most `max_idle` buffers.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Takes an empty buffer from the pool, allocating if none is idle.
    #[must_use]
    pub fn get(&self) -> Vec<u8> {
        self.idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY))
    }

    /// Returns a buffer to the pool.
    pub fn put(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buffer.clear();
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(buffer);
            }
        }
    }

    /// Number of idle buffers.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_reused_and_cleared() {
        let pool = BufferPool::new(2);

        let mut buffer = pool.get();
        buffer.extend_from_slice(b"response body");
        let capacity = buffer.capacity();
        pool.put(buffer);
        assert_eq!(pool.idle(), 1);

        let reused = pool.get();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), capacity);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::new(1);

        pool.put(Vec::with_capacity(8));
        pool.put(Vec::with_capacity(8));
        pool.put(Vec::with_capacity(MAX_POOLED_CAPACITY + 1));

        assert_eq!(pool.idle(), 1);
    }
}
