//! Conversions between wall-clock durations and sample counts of an ECG stream.
//!
//! Detector timing (integration window, refractory period, learning phase) is specified in
//! milliseconds and turned into sample counts here, so the same presets work for the 200 sps
//! reference recordings and the 64 sps board.

/// Rate of an ECG stream, in samples per second.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SamplingFrequency(f32);

/// Builds a [`SamplingFrequency`] from a plain number.
///
/// # Usage
/// ```rust
/// use ecg_frontend::sampling::*;
///
/// let board = 64.sps();
/// let recording = 200.sps();
///
/// assert_eq!(recording, 0.2.ksps());
/// assert!(board < recording);
/// ```
pub trait SamplingFrequencyExt {
    fn sps(self) -> SamplingFrequency;
    fn ksps(self) -> SamplingFrequency;
}

impl SamplingFrequencyExt for f32 {
    fn sps(self) -> SamplingFrequency {
        SamplingFrequency(self)
    }

    fn ksps(self) -> SamplingFrequency {
        (self * 1000.0).sps()
    }
}

impl SamplingFrequencyExt for u32 {
    fn sps(self) -> SamplingFrequency {
        SamplingFrequency(self as f32)
    }

    fn ksps(self) -> SamplingFrequency {
        (self * 1000).sps()
    }
}

impl SamplingFrequency {
    /// Samples per second.
    pub fn raw(self) -> f32 {
        self.0
    }

    /// Number of whole samples that fit into `ms` milliseconds.
    /// ```rust
    /// # use ecg_frontend::sampling::*;
    /// #
    /// // integration window and T-wave period
    /// assert_eq!(200.sps().ms_to_samples(150.0), 30);
    /// assert_eq!(64.sps().ms_to_samples(360.0), 23);
    /// ```
    pub fn ms_to_samples(self, ms: f32) -> u32 {
        ((ms * self.0) as u32) / 1000
    }

    /// Number of whole samples that fit into `s` seconds.
    /// ```rust
    /// # use ecg_frontend::sampling::*;
    /// #
    /// // learning phase
    /// assert_eq!(200.sps().s_to_samples(2.0), 400);
    /// assert_eq!(64.sps().s_to_samples(2.0), 128);
    /// ```
    pub fn s_to_samples(self, s: f32) -> u32 {
        self.ms_to_samples(s * 1000.0)
    }

    /// ```rust
    /// # use ecg_frontend::sampling::*;
    /// #
    /// assert_eq!(64.sps().samples_to_s(32), 0.5);
    /// ```
    pub fn samples_to_s(self, samples: u32) -> f32 {
        (samples as f32) / self.0
    }

    /// ```rust
    /// # use ecg_frontend::sampling::*;
    /// #
    /// // refractory period
    /// assert_eq!(200.sps().samples_to_ms(40), 200.0);
    /// ```
    pub fn samples_to_ms(self, samples: u32) -> f32 {
        self.samples_to_s(samples) * 1000.0
    }

    /// Heart rate in beats per minute for an RR interval of `samples`.
    ///
    /// Returns `None` for a zero-length interval.
    /// ```rust
    /// # use ecg_frontend::sampling::*;
    /// #
    /// assert_eq!(200.sps().samples_to_bpm(160), Some(75.0));
    /// assert_eq!(64.sps().samples_to_bpm(64), Some(60.0));
    /// assert_eq!(64.sps().samples_to_bpm(0), None);
    /// ```
    pub fn samples_to_bpm(self, samples: u32) -> Option<f32> {
        (samples > 0).then(|| 60.0 / self.samples_to_s(samples))
    }
}
