//! Optional hooks into the intermediate values of the processing chain.
//!
//! Nothing in the crate depends on an observer being present; the `*_observed` entry points
//! accept one, the plain entry points pass `()`.

use crate::{algorithms::energy::EnergySample, Thresholds};

/// How one integrated sample was judged after the learning phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Above `I1` and outside the refractory and T-wave checks.
    Accepted,
    /// Below `I1` but above `I2` after an unusually long RR gap.
    SearchBack,
    /// Too close to the previous beat.
    Refractory,
    /// Shallow slope shortly after a beat, most likely the T wave.
    TWave,
    /// Everything else, including every sample below `I1`. Updates the noise level.
    Noise,
}

impl Outcome {
    pub fn is_beat(self) -> bool {
        matches!(self, Outcome::Accepted | Outcome::SearchBack)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stage {
    /// Output of the jitter smoother.
    Smoothed(u16),
    /// Output of the baseline removal, when enabled.
    BaselineRemoved(i32),
    /// Output of the band-pass cascade.
    BandPassed(i32),
    /// Output of the smoother after the band-pass, when enabled.
    OutputSmoothed(i32),
    /// Derivative, squared derivative and integrated energy of one sample.
    Energy(EnergySample),
    /// The learning phase finished with these thresholds.
    Learned(Thresholds),
    /// An integrated sample was judged against the thresholds.
    Decision {
        index: u32,
        value: i32,
        outcome: Outcome,
    },
}

pub trait Observer {
    fn stage(&mut self, stage: Stage);
}

impl Observer for () {
    #[inline]
    fn stage(&mut self, _stage: Stage) {}
}
