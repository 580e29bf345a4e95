//! Tuning parameters and named presets.
//!
//! Window sizes that determine storage are type parameters (see [`crate::filter`] and
//! [`crate::QrsDetector::new`]); everything else lives here.

use crate::sampling::{SamplingFrequency, SamplingFrequencyExt};

/// Parameters of the adaptive QRS detector. Durations are in samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorConfig {
    pub fs: SamplingFrequency,
    /// Length of the moving-window integrator, ~150 ms.
    pub integration_window: usize,
    /// Moving average over the squared derivative before integration. `1` disables it, at
    /// most [`crate::MAX_SQUARE_SMOOTHING`] samples are used.
    pub square_smoothing: usize,
    /// No beat is accepted this soon after the previous one, ~200 ms.
    pub refractory: u32,
    /// Peaks this soon after a beat are checked for being T waves, ~360 ms.
    pub t_wave: u32,
    /// Samples used to estimate the initial signal and noise levels, ~2 s.
    pub learning: u32,
    /// `I1 = NPKI + signal_factor * (SPKI - NPKI)`
    pub signal_factor: f32,
    /// `I2 = noise_factor * I1`
    pub noise_factor: f32,
    /// RR intervals within `rr_low..=rr_high` times RR-AVG1 count towards RR-AVG2.
    pub rr_low: f32,
    pub rr_high: f32,
    /// Search-back starts after `search_back * RR-AVG1` samples without a beat.
    pub search_back: f32,
}

impl DetectorConfig {
    /// Standard Pan-Tompkins timing for signals sampled with `fs`.
    ///
    /// ```rust
    /// use ecg_frontend::config::DetectorConfig;
    /// use ecg_frontend::sampling::*;
    ///
    /// let config = DetectorConfig::for_sampling_frequency(200.sps());
    /// assert_eq!(config.integration_window, 30);
    /// assert_eq!(config.refractory, 40);
    /// assert_eq!(config.t_wave, 72);
    /// assert_eq!(config.learning, 400);
    /// ```
    pub fn for_sampling_frequency(fs: SamplingFrequency) -> Self {
        Self {
            fs,
            integration_window: fs.ms_to_samples(150.0) as usize,
            square_smoothing: 1,
            refractory: fs.ms_to_samples(200.0),
            t_wave: fs.ms_to_samples(360.0),
            learning: fs.s_to_samples(2.0),
            signal_factor: 0.25,
            noise_factor: 0.5,
            rr_low: 0.92,
            rr_high: 1.16,
            search_back: 1.66,
        }
    }

    /// Tuning of the 64 sps board firmware: a 10 sample (156 ms) integrator fed by a 4 sample
    /// average of the squared derivative, and low threshold factors for its weak, heavily
    /// smoothed signal. Pair it with [`crate::filter::Pipeline64Hz`].
    pub fn board_64hz() -> Self {
        Self {
            integration_window: 10,
            square_smoothing: 4,
            signal_factor: 0.03,
            noise_factor: 0.3,
            ..Self::for_sampling_frequency(64.sps())
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::for_sampling_frequency(200.sps())
    }
}

/// How an amplitude limit of the static-threshold detector is derived for a window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AmplitudePolicy {
    /// A fixed value, in filtered-sample units.
    Fixed(i32),
    /// `factor` times the standard deviation of the window, but at least `floor`.
    Scaled { factor: f32, floor: i32 },
}

/// Parameters of [`crate::StaticThresholdDetector`]. Distances are in samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticThresholdConfig {
    /// A sample must exceed this (after removing the window mean) to be a candidate.
    pub threshold: AmplitudePolicy,
    /// A refined peak must exceed this (after removing the window mean) to be reported.
    pub min_amplitude: AmplitudePolicy,
    /// A candidate must not be smaller than any neighbor this close.
    pub peak_window: usize,
    /// Refinement searches this far around each candidate.
    pub refine_window: usize,
    /// Bounds for the minimum beat distance estimated from the candidates.
    pub min_distance_floor: usize,
    pub min_distance_ceiling: usize,
    /// Minimum beat distance used when fewer than two candidates were found.
    pub default_min_distance: usize,
    /// At most this many peaks are reported per window.
    pub max_peaks: usize,
}

impl Default for StaticThresholdConfig {
    /// Tuned for 200 sps band-passed ADC data.
    fn default() -> Self {
        Self {
            threshold: AmplitudePolicy::Fixed(100),
            min_amplitude: AmplitudePolicy::Fixed(150),
            peak_window: 2,
            refine_window: 10,
            min_distance_floor: 30,
            min_distance_ceiling: 60,
            default_min_distance: 40,
            max_peaks: 50,
        }
    }
}

impl StaticThresholdConfig {
    /// Thresholds scaled by the spread of each window instead of fixed values.
    pub fn scaled() -> Self {
        Self {
            threshold: AmplitudePolicy::Scaled {
                factor: 2.0,
                floor: 100,
            },
            min_amplitude: AmplitudePolicy::Scaled {
                factor: 1.5,
                floor: 150,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_preset_matches_firmware_timing() {
        let config = DetectorConfig::board_64hz();

        assert_eq!(config.integration_window, 10);
        assert_eq!(config.square_smoothing, 4);
        assert_eq!(config.refractory, 12);
        assert_eq!(config.t_wave, 23);
        assert_eq!(config.learning, 128);
    }

    #[test]
    fn square_smoothing_is_off_by_default() {
        assert_eq!(DetectorConfig::default().square_smoothing, 1);
        assert_eq!(DetectorConfig::for_sampling_frequency(64.sps()).square_smoothing, 1);
    }
}
