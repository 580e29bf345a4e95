//! Glue between the acquisition interrupt, the detectors and the main loop.
//!
//! The acquisition context owns a [`Frontend`] and calls [`Frontend::on_sample`] once per timer
//! tick. Each tick conditions the raw sample, runs streaming detection, writes a
//! [`SampleRecord`] into the shared [`SampleLink`] and collects the filtered sample into a
//! window for batch detection. The main loop only ever sees the [`SampleLink`]: it waits for the
//! send signal and drains the ring.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::Vec;
use log::{debug, warn};

use crate::{
    error::RingError,
    filter::Conditioner,
    observer::Observer,
    ring::ByteRing,
    QrsDetector, StaticThresholdDetector,
};

/// One tick worth of data as it travels through the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRecord {
    pub raw: u16,
    pub filtered: i16,
}

impl SampleRecord {
    pub const SIZE: usize = 4;

    /// Big-endian: `[raw_hi, raw_lo, filtered_hi, filtered_lo]`.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let [raw_hi, raw_lo] = self.raw.to_be_bytes();
        let [filt_hi, filt_lo] = self.filtered.to_be_bytes();
        [raw_hi, raw_lo, filt_hi, filt_lo]
    }

    pub fn decode(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            raw: u16::from_be_bytes([bytes[0], bytes[1]]),
            filtered: i16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// A [`ByteRing`] plus the "send" signal raised once enough data is waiting.
///
/// ```rust
/// use ecg_frontend::frontend::{SampleLink, SampleRecord};
///
/// static LINK: SampleLink<64> = SampleLink::new(8);
///
/// LINK.init().unwrap();
/// let record = SampleRecord { raw: 2048, filtered: -12 };
/// LINK.write(&record.encode()).unwrap();
/// assert!(!LINK.send_pending());
///
/// LINK.write(&record.encode()).unwrap();
/// assert!(LINK.send_pending());
///
/// let mut out = [0; 8];
/// assert_eq!(LINK.drain(&mut out), Ok(8));
/// assert!(!LINK.send_pending());
/// assert_eq!(SampleRecord::decode([out[4], out[5], out[6], out[7]]), record);
/// ```
pub struct SampleLink<const N: usize> {
    ring: ByteRing<N>,
    send: AtomicBool,
    threshold: usize,
}

impl<const N: usize> SampleLink<N> {
    /// `threshold` is the number of buffered bytes that raises the send signal.
    pub const fn new(threshold: usize) -> Self {
        Self {
            ring: ByteRing::new(),
            send: AtomicBool::new(false),
            threshold,
        }
    }

    pub fn init(&self) -> Result<(), RingError> {
        self.send.store(false, Ordering::Relaxed);
        self.ring.init()
    }

    pub fn ring(&self) -> &ByteRing<N> {
        &self.ring
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Producer side: appends `bytes` and raises the send signal if the threshold is reached.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, RingError> {
        let written = self.ring.write(bytes)?;
        if self.ring.data_count() >= self.threshold {
            self.send.store(true, Ordering::Release);
        }
        Ok(written)
    }

    pub fn send_pending(&self) -> bool {
        self.send.load(Ordering::Acquire)
    }

    /// Returns and lowers the send signal.
    pub fn take_send_signal(&self) -> bool {
        self.send.swap(false, Ordering::AcqRel)
    }

    /// Consumer side: lowers the send signal and reads up to `out.len()` bytes.
    pub fn drain(&self, out: &mut [u8]) -> Result<usize, RingError> {
        self.send.store(false, Ordering::Release);
        self.ring.read(out)
    }
}

/// A detector that processes one filled window of band-passed samples at a time.
pub trait BatchDetector {
    /// Marks detected beats in `flags` and returns how many there are.
    fn detect_window(&mut self, window: &[i32], flags: &mut [bool]) -> u32;

    fn peak_count(&self) -> u32;
}

impl<IB> BatchDetector for QrsDetector<IB>
where
    IB: AsRef<[i32]> + AsMut<[i32]>,
{
    fn detect_window(&mut self, window: &[i32], flags: &mut [bool]) -> u32 {
        QrsDetector::detect_window(self, window, flags)
    }

    fn peak_count(&self) -> u32 {
        QrsDetector::peak_count(self)
    }
}

impl<const CANDIDATES: usize> BatchDetector for StaticThresholdDetector<CANDIDATES> {
    fn detect_window(&mut self, window: &[i32], flags: &mut [bool]) -> u32 {
        self.detect(window, flags)
    }

    fn peak_count(&self) -> u32 {
        StaticThresholdDetector::peak_count(self)
    }
}

/// What happened during one call to [`Frontend::on_sample`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub filtered: i32,
    /// Sample index of a beat found by the streaming detector.
    pub beat: Option<u32>,
    /// Bytes of the sample record that made it into the ring.
    pub written: Result<usize, RingError>,
    /// Set on the tick that filled the window: beats found by the batch detector.
    pub window_peaks: Option<u32>,
}

/// Acquisition-side state, owned by whoever runs the sampling interrupt.
///
/// # Type parameters:
///
/// - `C` - signal conditioning, e.g. [`crate::filter::Pipeline200Hz`]
/// - `B` - the detector run once per filled window
/// - `IB` - integration buffer of the streaming detector
/// - `RING` - size of the shared ring
/// - `WINDOW` - samples per batch detection window
pub struct Frontend<'a, C, B, IB, const RING: usize, const WINDOW: usize> {
    conditioner: C,
    detector: QrsDetector<IB>,
    batch: B,
    link: &'a SampleLink<RING>,
    window: Vec<i32, WINDOW>,
    flags: [bool; WINDOW],
    window_peaks: Option<u32>,
}

impl<'a, C, B, IB, const RING: usize, const WINDOW: usize> Frontend<'a, C, B, IB, RING, WINDOW>
where
    C: Conditioner,
    B: BatchDetector,
    IB: AsRef<[i32]> + AsMut<[i32]>,
{
    pub fn new(
        conditioner: C,
        detector: QrsDetector<IB>,
        batch: B,
        link: &'a SampleLink<RING>,
    ) -> Self {
        Self {
            conditioner,
            detector,
            batch,
            link,
            window: Vec::new(),
            flags: [false; WINDOW],
            window_peaks: None,
        }
    }

    /// Restarts filtering, streaming detection and window collection.
    pub fn clear(&mut self) {
        self.conditioner.clear();
        self.detector.clear();
        self.rearm_window();
    }

    pub fn on_sample(&mut self, raw: u16) -> Tick {
        self.on_sample_observed(raw, &mut ())
    }

    /// Same as [`Frontend::on_sample`], reporting every stage to `observer`.
    pub fn on_sample_observed<O: Observer>(&mut self, raw: u16, observer: &mut O) -> Tick {
        let filtered = self.conditioner.condition_observed(raw, observer);
        let beat = self.detector.update_observed(filtered, observer);

        // conditioners are not bound to the i16 range of the record
        let record = SampleRecord {
            raw,
            filtered: filtered.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
        };
        let written = self.link.write(&record.encode());
        if let Err(error) = written {
            warn!("sample record not queued: {}", error);
        }

        Tick {
            filtered,
            beat,
            written,
            window_peaks: self.collect(filtered),
        }
    }

    /// Adds `filtered` to the window and runs batch detection when it becomes full.
    fn collect(&mut self, filtered: i32) -> Option<u32> {
        if self.window_peaks.is_some() || self.window.push(filtered).is_err() {
            return None;
        }

        if !self.window.is_full() {
            return None;
        }

        let peaks = self.batch.detect_window(&self.window, &mut self.flags);
        debug!("window of {} samples: {} beats", WINDOW, peaks);
        self.window_peaks = Some(peaks);
        self.window_peaks
    }

    /// Discards the collected window so that a new one starts with the next sample.
    pub fn rearm_window(&mut self) {
        self.window.clear();
        self.flags = [false; WINDOW];
        self.window_peaks = None;
    }

    /// Samples collected for the current window.
    pub fn window(&self) -> &[i32] {
        &self.window
    }

    /// Beat flags of the last completed window, `None` while the window is filling.
    pub fn window_flags(&self) -> Option<&[bool]> {
        self.window_peaks.map(|_| &self.flags[..])
    }

    pub fn detector(&self) -> &QrsDetector<IB> {
        &self.detector
    }

    pub fn batch(&self) -> &B {
        &self.batch
    }

    pub fn link(&self) -> &'a SampleLink<RING> {
        self.link
    }
}
