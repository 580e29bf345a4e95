//! Batch QRS detection with a static amplitude threshold.
//!
//! Unlike [`crate::QrsDetector`] this has no learning phase and no RR feedback: it looks at one
//! window of band-passed samples at a time and reports the largest well separated local maxima.
//! It works well when the signal quality is uniformly good within the window.

use heapless::Vec;
use log::debug;

#[allow(unused_imports)]
use micromath::F32Ext;

use crate::config::{AmplitudePolicy, StaticThresholdConfig};

/// Default number of candidate peaks considered per window.
pub const MAX_CANDIDATES: usize = 64;

#[derive(Clone, Copy, Debug)]
struct Candidate {
    index: usize,
    /// Value with the window mean removed.
    amplitude: i32,
}

/// Static-threshold detector keeping at most `CANDIDATES` candidate peaks per window.
///
/// ```rust
/// use ecg_frontend::StaticThresholdDetector;
///
/// let mut window = [0; 600];
/// for &peak in &[100, 300, 500] {
///     window[peak] = 800;
/// }
///
/// let mut flags = [false; 600];
/// let mut detector: StaticThresholdDetector = StaticThresholdDetector::default();
/// assert_eq!(detector.detect(&window, &mut flags), 3);
/// assert!(flags[100] && flags[300] && flags[500]);
/// ```
pub struct StaticThresholdDetector<const CANDIDATES: usize = MAX_CANDIDATES> {
    config: StaticThresholdConfig,
    peak_count: u32,
}

impl<const CANDIDATES: usize> Default for StaticThresholdDetector<CANDIDATES> {
    fn default() -> Self {
        Self::new(StaticThresholdConfig::default())
    }
}

impl<const CANDIDATES: usize> StaticThresholdDetector<CANDIDATES> {
    pub fn new(config: StaticThresholdConfig) -> Self {
        Self {
            config,
            peak_count: 0,
        }
    }

    pub fn config(&self) -> &StaticThresholdConfig {
        &self.config
    }

    /// Number of peaks reported by the last call to [`StaticThresholdDetector::detect`].
    pub fn peak_count(&self) -> u32 {
        self.peak_count
    }

    /// Marks the QRS peaks of `window` in `flags` and returns how many were found.
    ///
    /// `flags` is cleared first; positions past its end are never marked.
    pub fn detect(&mut self, window: &[i32], flags: &mut [bool]) -> u32 {
        self.peak_count = 0;
        flags.iter_mut().for_each(|flag| *flag = false);

        if window.is_empty() {
            return 0;
        }

        let mean = mean(window);
        let threshold = self.limit(self.config.threshold, window, mean);
        let min_amplitude = self.limit(self.config.min_amplitude, window, mean);

        let candidates = self.find_candidates(window, mean, threshold);
        let min_distance = self.min_distance(&candidates);
        let merged = merge::<CANDIDATES>(&candidates, min_distance);

        for candidate in merged {
            if self.peak_count as usize >= self.config.max_peaks {
                break;
            }

            let index = self.refine(window, candidate.index);
            let amplitude = window[index].saturating_sub(mean);
            if amplitude <= min_amplitude {
                continue;
            }

            if let Some(flag) = flags.get_mut(index) {
                if !*flag {
                    *flag = true;
                    self.peak_count += 1;
                }
            }
        }

        debug!(
            "static threshold: {} candidates, min distance {}, {} peaks",
            candidates.len(),
            min_distance,
            self.peak_count
        );

        self.peak_count
    }

    fn limit(&self, policy: AmplitudePolicy, window: &[i32], mean: i32) -> i32 {
        match policy {
            AmplitudePolicy::Fixed(value) => value,
            AmplitudePolicy::Scaled { factor, floor } => {
                let scaled = factor * std_dev(window, mean);
                (scaled as i32).max(floor)
            }
        }
    }

    /// Local maxima above `threshold`, left to right.
    fn find_candidates(
        &self,
        window: &[i32],
        mean: i32,
        threshold: i32,
    ) -> Vec<Candidate, CANDIDATES> {
        let peak_window = self.config.peak_window;
        let adjusted = |i: usize| window[i].saturating_sub(mean);

        let mut candidates = Vec::new();
        let mut i = 0;
        while i < window.len() && !candidates.is_full() {
            let amplitude = adjusted(i);
            if amplitude <= threshold {
                i += 1;
                continue;
            }

            let start = i.saturating_sub(peak_window);
            let end = (i + peak_window).min(window.len() - 1);
            let is_peak = (start..=end).all(|j| amplitude >= adjusted(j));

            if is_peak {
                // the vector was checked to have room above
                let _ = candidates.push(Candidate { index: i, amplitude });
                i += peak_window + 1;
            } else {
                i += 1;
            }
        }

        candidates
    }

    /// Half the average candidate spacing, within the configured bounds.
    fn min_distance(&self, candidates: &[Candidate]) -> usize {
        match candidates {
            [first, .., last] => {
                let spacing = (last.index - first.index) / (candidates.len() - 1);
                (spacing / 2).clamp(
                    self.config.min_distance_floor,
                    self.config.min_distance_ceiling.max(self.config.min_distance_floor),
                )
            }
            _ => self.config.default_min_distance,
        }
    }

    /// Position of the largest sample within the refine window around `index`.
    fn refine(&self, window: &[i32], index: usize) -> usize {
        let start = index.saturating_sub(self.config.refine_window);
        let end = (index + self.config.refine_window).min(window.len() - 1);

        (start..=end).fold(index, |best, j| if window[j] > window[best] { j } else { best })
    }
}

/// Keeps the largest candidate of each group closer than `min_distance` to the one kept.
fn merge<const CANDIDATES: usize>(
    candidates: &[Candidate],
    min_distance: usize,
) -> Vec<Candidate, CANDIDATES> {
    let mut merged: Vec<Candidate, CANDIDATES> = Vec::new();

    for &candidate in candidates {
        match merged.last_mut() {
            Some(kept) if candidate.index - kept.index < min_distance => {
                if candidate.amplitude > kept.amplitude {
                    *kept = candidate;
                }
            }
            // at most as many as there were candidates
            _ => {
                let _ = merged.push(candidate);
            }
        }
    }

    merged
}

fn mean(window: &[i32]) -> i32 {
    let sum: i64 = window.iter().copied().map(i64::from).sum();
    (sum / window.len() as i64) as i32
}

fn std_dev(window: &[i32], mean: i32) -> f32 {
    let variance = window
        .iter()
        .map(|&x| {
            let d = (i64::from(x) - i64::from(mean)) as f32;
            d * d
        })
        .sum::<f32>()
        / window.len() as f32;

    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Triangular bumps of height `height` centered on `peaks`, over an ADC baseline.
    fn window_with_peaks(len: usize, peaks: &[(usize, i32)]) -> std::vec::Vec<i32> {
        let mut window = vec![2048; len];
        for &(center, height) in peaks {
            for offset in 0..6usize {
                let value = height - height * offset as i32 / 6;
                window[center - offset] += value;
                if offset > 0 {
                    window[center + offset] += value;
                }
            }
        }
        window
    }

    #[test]
    fn finds_well_separated_peaks() {
        let peaks: std::vec::Vec<(usize, i32)> = (0..8).map(|k| (100 + 230 * k, 800)).collect();
        let window = window_with_peaks(2000, &peaks);

        let mut flags = [false; 2000];
        let mut detector: StaticThresholdDetector = StaticThresholdDetector::default();
        assert_eq!(detector.detect(&window, &mut flags), 8);
        assert_eq!(detector.peak_count(), 8);

        for &(center, _) in &peaks {
            assert!(flags[center], "missed peak at {}", center);
        }
    }

    #[test]
    fn merges_candidates_closer_than_min_distance() {
        let mut peaks: std::vec::Vec<(usize, i32)> =
            (0..6).map(|k| (100 + 300 * k, 800)).collect();
        // a smaller bump right after the third beat
        peaks.push((720, 400));
        let window = window_with_peaks(2000, &peaks);

        let mut flags = [false; 2000];
        let mut detector: StaticThresholdDetector = StaticThresholdDetector::default();
        assert_eq!(detector.detect(&window, &mut flags), 6);
        assert!(flags[700]);
        assert!(!flags[720]);
    }

    #[test]
    fn flat_window_has_no_peaks() {
        let window = [1500; 500];
        let mut flags = [true; 500];
        let mut detector: StaticThresholdDetector = StaticThresholdDetector::default();

        assert_eq!(detector.detect(&window, &mut flags), 0);
        assert!(flags.iter().all(|&flag| !flag));
        assert_eq!(detector.detect(&[], &mut []), 0);
    }

    #[test]
    fn small_peaks_are_rejected() {
        let window = window_with_peaks(1000, &[(200, 120), (600, 800)]);
        let mut flags = [false; 1000];
        let mut detector: StaticThresholdDetector = StaticThresholdDetector::default();

        assert_eq!(detector.detect(&window, &mut flags), 1);
        assert!(flags[600]);
    }

    #[test]
    fn caps_reported_peaks() {
        let peaks: std::vec::Vec<(usize, i32)> = (0..8).map(|k| (100 + 230 * k, 800)).collect();
        let window = window_with_peaks(2000, &peaks);

        let mut flags = [false; 2000];
        let mut detector: StaticThresholdDetector = StaticThresholdDetector::new(
            StaticThresholdConfig {
                max_peaks: 3,
                ..StaticThresholdConfig::default()
            },
        );
        assert_eq!(detector.detect(&window, &mut flags), 3);
        assert_eq!(flags.iter().filter(|&&flag| flag).count(), 3);
    }

    #[test]
    fn scaled_thresholds_follow_the_signal_spread() {
        let peaks: std::vec::Vec<(usize, i32)> = (0..8).map(|k| (100 + 230 * k, 800)).collect();
        let window = window_with_peaks(2000, &peaks);

        let mut flags = [false; 2000];
        let mut detector: StaticThresholdDetector =
            StaticThresholdDetector::new(StaticThresholdConfig::scaled());
        assert_eq!(detector.detect(&window, &mut flags), 8);
    }
}
