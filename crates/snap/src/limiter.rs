//! I/O rate limiting for snapshot files
//!
//! Snapshot writes go through an [`IoLimiter`]. The manager always holds
//! one: [`UnlimitedLimiter`] when no rate is configured, a
//! [`BytesPerSecLimiter`] otherwise.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Admission control for snapshot bytes
pub trait IoLimiter: Send + Sync + fmt::Debug {
    /// Block until `bytes` may be written
    fn request(&self, bytes: usize);

    /// Configured rate, `None` when unlimited
    fn bytes_per_sec(&self) -> Option<u64>;
}

/// Limiter that never blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedLimiter;

impl IoLimiter for UnlimitedLimiter {
    fn request(&self, _bytes: usize) {}

    fn bytes_per_sec(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug)]
struct Bucket {
    /// Available tokens; negative while a large request is being paid off
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with a one-second burst
#[derive(Debug)]
pub struct BytesPerSecLimiter {
    rate: u64,
    bucket: Mutex<Bucket>,
}

impl BytesPerSecLimiter {
    /// Create a limiter admitting `rate` bytes per second (`rate > 0`)
    pub fn new(rate: u64) -> Self {
        debug_assert!(rate > 0);
        BytesPerSecLimiter {
            rate,
            bucket: Mutex::new(Bucket {
                tokens: rate as f64,
                last_refill: Instant::now(),
            }),
        }
    }
}

impl IoLimiter for BytesPerSecLimiter {
    fn request(&self, bytes: usize) {
        let wait = {
            let mut bucket = self.bucket.lock();
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            let capacity = self.rate as f64;
            bucket.tokens = (bucket.tokens + elapsed * capacity).min(capacity);
            bucket.last_refill = now;
            bucket.tokens -= bytes as f64;
            if bucket.tokens < 0.0 {
                Duration::from_secs_f64(-bucket.tokens / capacity)
            } else {
                Duration::ZERO
            }
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }

    fn bytes_per_sec(&self) -> Option<u64> {
        Some(self.rate)
    }
}

/// Writer charging every write to a limiter
#[derive(Debug)]
pub struct LimitWriter<W> {
    limiter: Arc<dyn IoLimiter>,
    inner: W,
}

impl<W: Write> LimitWriter<W> {
    /// Wrap `inner`
    pub fn new(limiter: Arc<dyn IoLimiter>, inner: W) -> Self {
        LimitWriter { limiter, inner }
    }

    /// Unwrap the inner writer
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Borrow the inner writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for LimitWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.limiter.request(buf.len());
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
