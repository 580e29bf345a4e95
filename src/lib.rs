//! This crate provides a realtime ECG front end for small microcontrollers.
//!
//! - [`ring::ByteRing`] moves sample records from the acquisition interrupt to the main loop
//! - [`filter`] removes jitter and baseline wander and band-limits the signal
//! - [`QrsDetector`] finds QRS complexes with adaptive (Pan-Tompkins style) thresholds, either
//!   sample by sample or one window at a time
//! - [`StaticThresholdDetector`] is a simpler batch detector with a fixed amplitude threshold
//! - [`frontend`] ties them together for an acquisition interrupt and a main loop
//! - [`evaluate`] scores detections against annotated beats
//!
//! The adaptive detector follows [Pan and Tompkins, "A Real-Time QRS Detection Algorithm"](https://doi.org/10.1109/TBME.1985.325532).
#![cfg_attr(not(test), no_std)]

mod algorithms;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod frontend;
pub mod observer;
pub mod ring;
pub mod sampling;
mod sliding;

use log::{debug, trace};

use algorithms::{energy::Energy, levels::Levels, rr::RrHistory};
use config::DetectorConfig;
use observer::{Observer, Outcome, Stage};

pub use algorithms::energy::{EnergySample, MAX_SQUARE_SMOOTHING};
pub use algorithms::rr::RR_HISTORY;
pub use algorithms::static_threshold::{StaticThresholdDetector, MAX_CANDIDATES};

/// Finds QRS complexes in a band-passed ECG signal.
///
/// Every sample goes through a five-point derivative, squaring, an optional short moving
/// average and moving-window integration. The first [`DetectorConfig::learning`] samples only
/// estimate the initial signal and noise levels. After that every integrated sample is judged
/// as it arrives against the adaptive thresholds `I1`/`I2`, the refractory period, the T-wave
/// check and search-back.
///
/// A beat is returned by the call that processes the sample crossing the threshold, together
/// with that sample's index, counted from creation or the last [`QrsDetector::clear`].
///
/// # Type parameters:
///
/// - `IB` - a buffer type holding [`DetectorConfig::integration_window`] samples
pub struct QrsDetector<IB> {
    config: DetectorConfig,
    total_samples: u32,
    energy: Energy<IB>,
    levels: Levels,
    rr: RrHistory,
    last_beat: Option<u32>,
    /// Squared slope at the last beat, for T-wave discrimination
    last_slope: i32,
    peak_count: u32,
}

impl QrsDetector<()> {
    /// Creates a new QRS detector. The integration buffer is allocated as part of the
    /// `QrsDetector` structure.
    ///
    /// # Example
    /// ```rust
    /// use ecg_frontend::config::DetectorConfig;
    /// use ecg_frontend::QrsDetector;
    ///
    /// // 200 samples per second, the type parameter is 150ms in number of samples
    /// let detector = QrsDetector::new::<30>(DetectorConfig::default());
    /// ```
    pub fn new<const SAMPLES_150: usize>(config: DetectorConfig) -> QrsDetector<[i32; SAMPLES_150]> {
        Self::new_from(config, [0; SAMPLES_150])
    }

    /// Creates a new QRS detector using the provided integration buffer.
    ///
    /// # Examples
    ///
    /// The backing buffer may be a slice:
    ///
    /// ```rust
    /// use ecg_frontend::config::DetectorConfig;
    /// use ecg_frontend::QrsDetector;
    ///
    /// let mut buffer = [0; 10];
    /// let detector = QrsDetector::new_from(DetectorConfig::board_64hz(), &mut buffer[..]);
    /// ```
    pub fn new_from<IB>(config: DetectorConfig, integration_buffer: IB) -> QrsDetector<IB>
    where
        IB: AsRef<[i32]> + AsMut<[i32]>,
    {
        // sanity check buffer size
        debug_assert_eq!(
            integration_buffer.as_ref().len(),
            config.integration_window,
            "Incorrect integration buffer, must hold {} samples",
            config.integration_window
        );

        QrsDetector {
            config,
            total_samples: 0,
            energy: Energy::new(integration_buffer, config.square_smoothing),
            levels: Levels::new(config.learning, config.signal_factor, config.noise_factor),
            rr: RrHistory::new(config.rr_low, config.rr_high),
            last_beat: None,
            last_slope: 0,
            peak_count: 0,
        }
    }
}

impl<IB> QrsDetector<IB>
where
    IB: AsRef<[i32]> + AsMut<[i32]>,
{
    /// Resets the internal state of the detector, including the learning phase.
    pub fn clear(&mut self) {
        self.total_samples = 0;
        self.energy.clear();
        self.levels.clear();
        self.rr.clear();
        self.last_beat = None;
        self.last_slope = 0;
        self.peak_count = 0;
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Processes a band-passed sample. Returns the index of this sample if it is a QRS complex.
    pub fn update(&mut self, sample: i32) -> Option<u32> {
        self.update_observed(sample, &mut ())
    }

    /// Same as [`QrsDetector::update`], reporting intermediate values to `observer`.
    pub fn update_observed<O: Observer>(&mut self, sample: i32, observer: &mut O) -> Option<u32> {
        let idx = self.total_samples;
        self.total_samples = self.total_samples.wrapping_add(1);

        let energy = self.energy.update(sample);
        observer.stage(Stage::Energy(energy));

        if self.levels.is_learning() {
            if let Some(thresholds) = self.levels.learn(energy.integrated) {
                debug!(
                    "learning done after {} samples: I1 = {}, I2 = {}",
                    self.config.learning, thresholds.i1, thresholds.i2
                );
                observer.stage(Stage::Learned(thresholds));
            }
            return None;
        }

        let outcome = self.classify(idx, &energy);
        observer.stage(Stage::Decision {
            index: idx,
            value: energy.integrated,
            outcome,
        });

        match outcome {
            Outcome::Accepted | Outcome::SearchBack => {
                if outcome == Outcome::SearchBack {
                    debug!("beat at {} recovered by search-back", idx);
                }
                self.accept(idx, &energy);
                Some(idx)
            }
            Outcome::Refractory | Outcome::TWave => {
                trace!("sample {} above I1 rejected: {:?}", idx, outcome);
                self.levels.update_noise(energy.integrated);
                None
            }
            Outcome::Noise => {
                self.levels.update_noise(energy.integrated);
                None
            }
        }
    }

    fn classify(&self, idx: u32, energy: &EnergySample) -> Outcome {
        let Some(thresholds) = self.levels.thresholds() else {
            return Outcome::Noise;
        };

        let elapsed = self.last_beat.map(|beat| idx.wrapping_sub(beat));
        let value = energy.integrated as f32;

        if value > thresholds.i1 {
            match elapsed {
                Some(elapsed) if elapsed < self.config.refractory => Outcome::Refractory,
                // half the slope of the previous beat, compared as squares
                Some(elapsed)
                    if elapsed < self.config.t_wave
                        && self.last_slope > 0
                        && 4 * i64::from(energy.squared) < i64::from(self.last_slope) =>
                {
                    Outcome::TWave
                }
                _ => Outcome::Accepted,
            }
        } else {
            match (elapsed, self.rr.average1()) {
                (Some(elapsed), Some(rr))
                    if elapsed as f32 > self.config.search_back * rr as f32
                        && value > thresholds.i2 =>
                {
                    Outcome::SearchBack
                }
                _ => Outcome::Noise,
            }
        }
    }

    fn accept(&mut self, idx: u32, energy: &EnergySample) {
        self.last_slope = energy.squared;
        self.levels.update_signal(energy.integrated);

        if let Some(beat) = self.last_beat {
            self.rr.record(idx.wrapping_sub(beat));
        }
        self.last_beat = Some(idx);
        self.peak_count += 1;
    }

    /// Runs batch detection over one window of band-passed samples.
    ///
    /// The detector is reset first, so every window goes through its own learning phase. Beats
    /// are marked in `flags` (cleared first) at the window index of the sample that triggered
    /// them, including beats on the last sample of the window. The number of beats is
    /// returned and also available from [`QrsDetector::peak_count`].
    pub fn detect_window(&mut self, window: &[i32], flags: &mut [bool]) -> u32 {
        self.clear();
        flags.iter_mut().for_each(|flag| *flag = false);

        for &sample in window {
            if let Some(idx) = self.update(sample) {
                if let Some(flag) = flags.get_mut(idx as usize) {
                    *flag = true;
                }
            }
        }

        self.peak_count
    }

    /// Number of beats detected since creation or the last reset.
    pub fn peak_count(&self) -> u32 {
        self.peak_count
    }

    /// Sample index of the last detected beat.
    pub fn last_beat(&self) -> Option<u32> {
        self.last_beat
    }

    pub fn is_learning(&self) -> bool {
        self.levels.is_learning()
    }

    /// Returns the current levels and thresholds, or `None` during the learning phase.
    pub fn thresholds(&self) -> Option<Thresholds> {
        self.levels.thresholds()
    }

    /// Mean of the recorded RR intervals (RR-AVG1), in samples.
    pub fn rr_average1(&self) -> Option<u32> {
        self.rr.average1()
    }

    /// Mean of the regular RR intervals (RR-AVG2), in samples.
    pub fn rr_average2(&self) -> Option<u32> {
        self.rr.average2()
    }

    /// Heart rate in beats per minute, from RR-AVG2.
    pub fn heart_rate(&self) -> Option<f32> {
        self.rr
            .average2()
            .and_then(|rr| self.config.fs.samples_to_bpm(rr))
    }
}

/// Signal and noise levels (SPKI/NPKI) and the thresholds derived from them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub signal_level: f32,
    pub noise_level: f32,
    /// Primary threshold, `NPKI + signal_factor * (SPKI - NPKI)`
    pub i1: f32,
    /// Search-back threshold, `noise_factor * I1`
    pub i2: f32,
}
