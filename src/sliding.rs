//! Trailing windows over a fixed backing buffer.
//!
//! Every stage that needs the last N samples (smoother, band-pass stages, derivative taps,
//! moving-window integration, RR history) keeps them in a [`SlidingWindow`]: the buffer is
//! written circularly, so a new sample costs O(1) instead of shifting the whole history.

use core::marker::PhantomData;

pub struct SlidingWindow<T, C> {
    buffer: C,
    idx: usize,
    full: bool,
    _marker: PhantomData<T>,
}

impl<T: Default + Copy, const N: usize> Default for SlidingWindow<T, [T; N]> {
    fn default() -> Self {
        Self::new([T::default(); N])
    }
}

impl<T, C> SlidingWindow<T, C>
where
    T: Copy,
    C: AsRef<[T]> + AsMut<[T]>,
{
    pub fn new(buffer: C) -> Self {
        Self {
            buffer,
            idx: 0,
            full: false,
            _marker: PhantomData,
        }
    }

    pub fn clear(&mut self) {
        self.idx = 0;
        self.full = false;
    }

    /// Number of slots in the backing buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().len()
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            self.idx
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Returns the sample pushed `age` calls ago, `0` being the latest one.
    pub fn recent(&self, age: usize) -> Option<T> {
        if age >= self.len() {
            return None;
        }

        let capacity = self.capacity();
        let idx = (self.idx + capacity - 1 - age) % capacity;
        Some(self.buffer.as_ref()[idx])
    }

    /// Stores `sample`, returning the sample it displaced once the window is full.
    pub fn push(&mut self, sample: T) -> Option<T> {
        let buffer = self.buffer.as_mut();
        if buffer.is_empty() {
            return Some(sample);
        }

        let old = self.full.then(|| buffer[self.idx]);

        buffer[self.idx] = sample;
        self.idx = (self.idx + 1) % buffer.len();
        if self.idx == 0 {
            self.full = true;
        }

        old
    }

    pub fn iter_unordered(&self) -> impl Iterator<Item = T> + Clone + '_ {
        (0..self.len()).map(move |i| self.buffer.as_ref()[i])
    }
}

/// The first `len` slots of an `N` slot array, for windows sized at run time.
pub struct Prefix<const N: usize> {
    data: [i32; N],
    len: usize,
}

impl<const N: usize> Prefix<N> {
    /// `len` is capped at `N`.
    pub fn new(len: usize) -> Self {
        Self {
            data: [0; N],
            len: len.min(N),
        }
    }
}

impl<const N: usize> AsRef<[i32]> for Prefix<N> {
    fn as_ref(&self) -> &[i32] {
        &self.data[..self.len]
    }
}

impl<const N: usize> AsMut<[i32]> for Prefix<N> {
    fn as_mut(&mut self) -> &mut [i32] {
        &mut self.data[..self.len]
    }
}

/// A [`SlidingWindow`] of `i32` samples that keeps the sum of its contents.
///
/// Slots that were never written count as zero, so [`SummingWindow::mean`] ramps up from zero
/// unless the window is seeded with [`SummingWindow::fill`] first.
pub struct SummingWindow<C> {
    window: SlidingWindow<i32, C>,
    sum: i64,
}

impl<const N: usize> Default for SummingWindow<[i32; N]> {
    fn default() -> Self {
        Self::new([0; N])
    }
}

impl<C> SummingWindow<C>
where
    C: AsRef<[i32]> + AsMut<[i32]>,
{
    pub fn new(buffer: C) -> Self {
        Self {
            window: SlidingWindow::new(buffer),
            sum: 0,
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.sum = 0;
    }

    /// Overwrites every slot with `value`.
    pub fn fill(&mut self, value: i32) {
        self.clear();
        for _ in 0..self.window.capacity() {
            self.push(value);
        }
    }

    pub fn push(&mut self, sample: i32) {
        self.sum += i64::from(sample);
        if let Some(old) = self.window.push(sample) {
            self.sum -= i64::from(old);
        }
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.window.is_full()
    }

    /// Integer mean over the whole window.
    pub fn mean(&self) -> i64 {
        match self.capacity() {
            0 => 0,
            n => self.sum() / n as i64,
        }
    }
}
