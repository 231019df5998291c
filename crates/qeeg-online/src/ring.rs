//! Fixed-capacity ring buffer for per-channel sample windows

use qeeg_core::{QeegError, QeegResult, Sample};

/// Fixed-length array + head + count. Once full, every push overwrites the
/// oldest sample; extraction materializes oldest-to-newest into a scratch
/// buffer the caller reuses across frames.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Vec<Sample>,
    head: usize,
    count: usize,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> QeegResult<Self> {
        if capacity == 0 {
            return Err(QeegError::invalid_param("ring capacity must be > 0"));
        }
        Ok(Self {
            buf: vec![0.0; capacity],
            head: 0,
            count: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Semantic length: number of valid samples (== capacity once full).
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.buf.len()
    }

    #[inline]
    pub fn push(&mut self, value: Sample) {
        self.buf[self.head] = value;
        self.head = (self.head + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
    }

    /// Copy the valid content, oldest first, into `out` (resized to fit).
    pub fn extract_into(&self, out: &mut Vec<Sample>) {
        out.resize(self.count, 0.0);
        if self.count == 0 {
            return;
        }
        let cap = self.buf.len();
        // Oldest sample sits at head once the ring has wrapped.
        let start = if self.is_full() { self.head } else { 0 };
        for (i, dst) in out.iter_mut().enumerate() {
            *dst = self.buf[(start + i) % cap];
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }
}
