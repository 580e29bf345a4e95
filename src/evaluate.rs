//! Scoring detected beats against reference annotations.
//!
//! ```rust
//! use ecg_frontend::evaluate::score;
//!
//! let score = score([102, 262, 300], &[100, 260, 420], 10);
//!
//! assert_eq!((score.tp, score.fp, score.fn_), (2, 1, 1));
//! assert_eq!(score.sensitivity, 2.0 / 3.0);
//! assert_eq!(score.ppv, 2.0 / 3.0);
//! ```

/// Matching tolerance, in samples, used by the reference recordings' tooling.
pub const DEFAULT_TOLERANCE: u32 = 10;

/// Detection counts and the ratios derived from them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Score {
    /// Detections within the tolerance of a reference beat
    pub tp: u32,
    /// Detections matching no reference beat
    pub fp: u32,
    /// Reference beats without a detection
    pub fn_: u32,
    /// `tp / (tp + fn)`, `0` without reference beats
    pub sensitivity: f32,
    /// `tp / (tp + fp)`, `0` without detections
    pub ppv: f32,
}

impl Score {
    fn from_counts(tp: u32, fp: u32, fn_: u32) -> Self {
        let ratio = |part: u32, total: u32| match total {
            0 => 0.0,
            total => part as f32 / total as f32,
        };

        Self {
            tp,
            fp,
            fn_,
            sensitivity: ratio(tp, tp + fn_),
            ppv: ratio(tp, tp + fp),
        }
    }
}

/// Matches `detected` against `reference`, both sorted in ascending order.
///
/// A detection is a true positive when it lies within `tolerance` samples of a reference beat
/// that no earlier detection has claimed. Every reference beat is matched at most once, so two
/// detections of the same complex count one true and one false positive.
pub fn score(detected: impl IntoIterator<Item = u32>, reference: &[u32], tolerance: u32) -> Score {
    let mut tp = 0;
    let mut fp = 0;
    let mut next = 0;

    for detection in detected {
        // reference beats too early for this detection cannot match any later one either
        while reference
            .get(next)
            .is_some_and(|&beat| beat.saturating_add(tolerance) < detection)
        {
            next += 1;
        }

        match reference.get(next) {
            Some(&beat) if beat.abs_diff(detection) <= tolerance => {
                tp += 1;
                next += 1;
            }
            _ => fp += 1,
        }
    }

    Score::from_counts(tp, fp, reference.len() as u32 - tp)
}

/// Like [`score`], taking the detections as per-sample beat flags.
pub fn score_flags(flags: &[bool], reference: &[u32], tolerance: u32) -> Score {
    let detected = flags
        .iter()
        .enumerate()
        .filter(|(_, &flag)| flag)
        .map(|(idx, _)| idx as u32);

    score(detected, reference, tolerance)
}
