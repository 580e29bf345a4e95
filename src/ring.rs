//! Single-producer/single-consumer byte ring.
//!
//! The acquisition interrupt writes sample records, the main loop drains them. One slot of the
//! backing array is never used so that `writer == reader` always means empty and
//! `writer + 1 == reader` (modulo size) always means full; the usable capacity is `N - 1`.
//!
//! Instead of disabling interrupts, every composite operation takes the buffer's `active` flag
//! for its duration. A call that finds the flag taken fails with [`RingError::Busy`] and may be
//! retried; it never blocks.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::trace;

use crate::error::RingError;

/// Backing arrays must be smaller than this, in bytes.
pub const MAX_SIZE: usize = 0x0080_0000;

const fn is_valid_size(size: usize) -> bool {
    size > 0 && size < MAX_SIZE
}

pub struct ByteRing<const N: usize> {
    data: UnsafeCell<[u8; N]>,
    writer: AtomicUsize,
    reader: AtomicUsize,
    overflow: AtomicUsize,
    initialized: AtomicBool,
    active: AtomicBool,
}

// SAFETY: `data` is only touched while holding the `active` flag (see `Guard`), which admits a
// single caller at a time. All other state is atomic.
unsafe impl<const N: usize> Sync for ByteRing<N> {}

/// Holds the ring's `active` flag; releases it when dropped.
struct Guard<'r> {
    active: &'r AtomicBool,
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.active.store(true, Ordering::Release);
    }
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteRing<N> {
    /// Creates an uninitialized ring. This is `const` so the ring can live in a `static` shared
    /// by the interrupt handler and the main loop; call [`ByteRing::init`] before use.
    pub const fn new() -> Self {
        Self {
            data: UnsafeCell::new([0; N]),
            writer: AtomicUsize::new(0),
            reader: AtomicUsize::new(0),
            overflow: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    /// Resets both cursors and the overflow counter and enables the ring.
    ///
    /// ```rust
    /// use ecg_frontend::ring::ByteRing;
    ///
    /// let ring: ByteRing<8> = ByteRing::new();
    /// ring.init().unwrap();
    /// assert_eq!(ring.capacity(), 7);
    ///
    /// let empty: ByteRing<0> = ByteRing::new();
    /// assert!(empty.init().is_err());
    /// ```
    pub fn init(&self) -> Result<(), RingError> {
        if !is_valid_size(N) {
            return Err(RingError::InvalidSize {
                size: N,
                max: MAX_SIZE,
            });
        }

        self.writer.store(0, Ordering::Relaxed);
        self.reader.store(0, Ordering::Relaxed);
        self.overflow.store(0, Ordering::Relaxed);
        self.initialized.store(true, Ordering::Release);
        self.active.store(true, Ordering::Release);

        Ok(())
    }

    fn acquire(&self) -> Result<Guard<'_>, RingError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(RingError::NotInitialized);
        }

        self.active
            .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| RingError::Busy)?;

        Ok(Guard {
            active: &self.active,
        })
    }

    /// Empties the ring without touching the backing array.
    pub fn clear(&self) -> Result<(), RingError> {
        let _guard = self.acquire()?;

        self.writer.store(0, Ordering::Release);
        self.reader.store(0, Ordering::Release);
        self.overflow.store(0, Ordering::Relaxed);

        Ok(())
    }

    /// Appends as much of `bytes` as fits and returns the number of bytes written.
    ///
    /// If not everything fits, [`ByteRing::overflow`] is set to the number of bytes dropped by
    /// this call; a write that fits resets it to zero.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, RingError> {
        let _guard = self.acquire()?;

        let space = self.space_count();
        let count = bytes.len().min(space);
        let dropped = bytes.len() - count;
        self.overflow.store(dropped, Ordering::Relaxed);
        if dropped > 0 {
            trace!("ring overflow, {} bytes dropped", dropped);
        }

        let mut writer = self.writer.load(Ordering::Acquire);
        // SAFETY: the guard grants exclusive access to `data`.
        let data = unsafe { &mut *self.data.get() };
        for &byte in &bytes[..count] {
            data[writer] = byte;
            writer = (writer + 1) % N;
        }
        self.writer.store(writer, Ordering::Release);

        Ok(count)
    }

    /// Moves up to `out.len()` bytes into `out` and returns how many were read.
    pub fn read(&self, out: &mut [u8]) -> Result<usize, RingError> {
        let _guard = self.acquire()?;

        let count = out.len().min(self.data_count());

        let mut reader = self.reader.load(Ordering::Acquire);
        // SAFETY: the guard grants exclusive access to `data`.
        let data = unsafe { &*self.data.get() };
        for slot in &mut out[..count] {
            *slot = data[reader];
            reader = (reader + 1) % N;
        }
        self.reader.store(reader, Ordering::Release);

        Ok(count)
    }

    /// Number of bytes available for reading.
    pub fn data_count(&self) -> usize {
        let writer = self.writer.load(Ordering::Acquire);
        let reader = self.reader.load(Ordering::Acquire);

        if writer >= reader {
            writer - reader
        } else {
            N - reader + writer
        }
    }

    /// Number of bytes that can be written before the ring is full.
    pub fn space_count(&self) -> usize {
        let writer = self.writer.load(Ordering::Acquire);
        let reader = self.reader.load(Ordering::Acquire);

        if reader > writer {
            reader - writer - 1
        } else {
            N.saturating_sub(1) - (writer - reader)
        }
    }

    /// Usable capacity, one less than the backing array.
    pub const fn capacity(&self) -> usize {
        N.saturating_sub(1)
    }

    /// Bytes dropped by the most recent write.
    pub fn overflow(&self) -> usize {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.data_count() == 0
    }
}
