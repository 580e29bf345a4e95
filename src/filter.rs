//! Signal conditioning: a jitter smoother followed by a moving-average band-pass cascade, with
//! optional baseline removal before the band-pass and optional smoothing after it.
//!
//! The band-pass filter approximates a ~0.5-40 Hz pass band with two moving averages:
//!
//! - stage A, low-pass: the mean of the last `LP` samples
//! - stage B, high-pass: stage A minus the mean of the last `HP` stage-A outputs
//!
//! Dividing by the window length keeps unity gain whatever the window sizes are, so changing
//! `LP`/`HP` for another sampling rate only moves the corner frequencies. The output is
//! saturated to the `i16` range so that squaring the derivative downstream cannot overflow.

use crate::{
    observer::{Observer, Stage},
    sliding::SummingWindow,
};

/// Preset for 200 sps: 3-sample smoother, ~40 Hz low-pass, ~0.5 Hz high-pass.
pub type Pipeline200Hz = FilterPipeline<3, 5, 128>;

/// Preset for the 64 sps board firmware: raw samples, a 1 s baseline removal, the band-pass
/// with its low-pass zero at Nyquist and a 5-sample smoother on the output.
pub type Pipeline64Hz = FilterPipeline<1, 2, 64, 64, 5>;

/// Moving average over the last `N` raw samples.
///
/// Until `N` samples have been seen the raw sample is passed through unchanged.
pub struct Smoother<const N: usize> {
    window: SummingWindow<[i32; N]>,
}

impl<const N: usize> Default for Smoother<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Smoother<N> {
    pub fn new() -> Self {
        Self {
            window: SummingWindow::default(),
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn update(&mut self, sample: u16) -> u16 {
        self.window.push(i32::from(sample));

        if self.window.is_full() {
            // the mean of u16 values is a u16 value
            self.window.mean() as u16
        } else {
            sample
        }
    }
}

/// Subtracts the mean of the last `N` samples. `N = 0` passes samples through.
///
/// The window is seeded with the first sample, like [`BandPass`].
pub struct BaselineRemoval<const N: usize> {
    window: SummingWindow<[i32; N]>,
    seeded: bool,
}

impl<const N: usize> Default for BaselineRemoval<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BaselineRemoval<N> {
    pub fn new() -> Self {
        Self {
            window: SummingWindow::default(),
            seeded: false,
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.seeded = false;
    }

    pub fn update(&mut self, sample: i32) -> i32 {
        if N == 0 {
            return sample;
        }

        if !self.seeded {
            self.window.fill(sample);
            self.seeded = true;
        }

        self.window.push(sample);
        (i64::from(sample) - self.window.mean()) as i32
    }
}

/// Moving average over the last `N` band-passed samples. `N = 0` passes samples through.
///
/// Slots count as zero until written, the band-pass output starts from zero as well.
pub struct OutputSmoother<const N: usize> {
    window: SummingWindow<[i32; N]>,
}

impl<const N: usize> Default for OutputSmoother<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> OutputSmoother<N> {
    pub fn new() -> Self {
        Self {
            window: SummingWindow::default(),
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn update(&mut self, sample: i32) -> i32 {
        if N == 0 {
            return sample;
        }

        self.window.push(sample);
        self.window.mean() as i32
    }
}

/// Two-stage moving-average band-pass filter.
///
/// Both histories are seeded with the first sample seen after creation or [`BandPass::clear`],
/// as if the input had been constant before. A constant input therefore produces zero
/// immediately, and a step settles back to zero once `LP + HP` samples have passed.
pub struct BandPass<const LP: usize, const HP: usize> {
    lowpass: SummingWindow<[i32; LP]>,
    highpass: SummingWindow<[i32; HP]>,
    seeded: bool,
}

impl<const LP: usize, const HP: usize> Default for BandPass<LP, HP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LP: usize, const HP: usize> BandPass<LP, HP> {
    pub fn new() -> Self {
        Self {
            lowpass: SummingWindow::default(),
            highpass: SummingWindow::default(),
            seeded: false,
        }
    }

    pub fn clear(&mut self) {
        self.lowpass.clear();
        self.highpass.clear();
        self.seeded = false;
    }

    pub fn update(&mut self, sample: i32) -> i32 {
        if !self.seeded {
            self.lowpass.fill(sample);
            self.highpass.fill(sample);
            self.seeded = true;
        }

        self.lowpass.push(sample);
        let lowpass = self.lowpass.mean();

        self.highpass.push(lowpass as i32);
        let highpass = lowpass - self.highpass.mean();

        highpass.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i32
    }
}

/// Turns raw ADC samples into band-limited samples for the detectors.
pub trait Conditioner {
    fn condition_observed<O: Observer>(&mut self, raw: u16, observer: &mut O) -> i32;

    fn condition(&mut self, raw: u16) -> i32 {
        self.condition_observed(raw, &mut ())
    }

    fn clear(&mut self);
}

/// [`Smoother`], [`BaselineRemoval`], [`BandPass`] and [`OutputSmoother`], in this order.
///
/// `BL` and `OS` default to zero, which leaves out the baseline removal and the output
/// smoother.
///
/// ```rust
/// use ecg_frontend::filter::{Conditioner, Pipeline200Hz};
///
/// let mut filters = Pipeline200Hz::new();
///
/// // the baseline is removed
/// for _ in 0..200 {
///     assert_eq!(filters.condition(2048), 0);
/// }
/// ```
pub struct FilterPipeline<
    const SM: usize,
    const LP: usize,
    const HP: usize,
    const BL: usize = 0,
    const OS: usize = 0,
> {
    smoother: Smoother<SM>,
    baseline: BaselineRemoval<BL>,
    bandpass: BandPass<LP, HP>,
    output: OutputSmoother<OS>,
}

impl<const SM: usize, const LP: usize, const HP: usize, const BL: usize, const OS: usize> Default
    for FilterPipeline<SM, LP, HP, BL, OS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const SM: usize, const LP: usize, const HP: usize, const BL: usize, const OS: usize>
    FilterPipeline<SM, LP, HP, BL, OS>
{
    pub fn new() -> Self {
        Self {
            smoother: Smoother::new(),
            baseline: BaselineRemoval::new(),
            bandpass: BandPass::new(),
            output: OutputSmoother::new(),
        }
    }
}

impl<const SM: usize, const LP: usize, const HP: usize, const BL: usize, const OS: usize> Conditioner
    for FilterPipeline<SM, LP, HP, BL, OS>
{
    fn condition_observed<O: Observer>(&mut self, raw: u16, observer: &mut O) -> i32 {
        let smoothed = self.smoother.update(raw);
        observer.stage(Stage::Smoothed(smoothed));

        let mut sample = i32::from(smoothed);
        if BL > 0 {
            sample = self.baseline.update(sample);
            observer.stage(Stage::BaselineRemoved(sample));
        }

        let mut filtered = self.bandpass.update(sample);
        observer.stage(Stage::BandPassed(filtered));

        if OS > 0 {
            filtered = self.output.update(filtered);
            observer.stage(Stage::OutputSmoothed(filtered));
        }

        filtered
    }

    fn clear(&mut self) {
        self.smoother.clear();
        self.baseline.clear();
        self.bandpass.clear();
        self.output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoother_passes_raw_samples_while_warming_up() {
        let mut smoother: Smoother<3> = Smoother::new();

        assert_eq!(smoother.update(10), 10);
        assert_eq!(smoother.update(40), 40);
        assert_eq!(smoother.update(70), 40);
        assert_eq!(smoother.update(100), 70);
    }

    #[test]
    fn smoother_keeps_constant_input() {
        let mut smoother: Smoother<5> = Smoother::new();
        for _ in 0..20 {
            assert_eq!(smoother.update(1234), 1234);
        }
    }

    #[test]
    fn bandpass_settles_after_step() {
        let mut bandpass: BandPass<5, 128> = BandPass::new();
        for _ in 0..50 {
            assert_eq!(bandpass.update(1000), 0);
        }

        let first = bandpass.update(3000);
        assert!(first > 0);

        let mut last = first;
        for _ in 0..(5 + 128) {
            last = bandpass.update(3000);
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn bandpass_rejects_dc_as_window_fills() {
        let mut bandpass: BandPass<5, 128> = BandPass::new();
        bandpass.update(0);

        // step from 0 to 2000: the response decays towards zero
        let outputs: Vec<i32> = (0..200).map(|_| bandpass.update(2000)).collect();
        let peak = outputs.iter().copied().max().unwrap();

        assert!(peak > 1500);
        assert!(outputs[100].abs() < outputs[10].abs());
        assert_eq!(outputs[199], 0);
    }

    #[test]
    fn bandpass_output_saturates() {
        let mut bandpass: BandPass<1, 4> = BandPass::new();
        bandpass.update(-100_000);

        assert_eq!(bandpass.update(100_000), i32::from(i16::MAX));
    }

    #[test]
    fn pipeline_reports_stages() {
        struct Recorder(Vec<Stage>);
        impl Observer for Recorder {
            fn stage(&mut self, stage: Stage) {
                self.0.push(stage);
            }
        }

        let mut pipeline = Pipeline200Hz::new();
        let mut recorder = Recorder(Vec::new());
        pipeline.condition_observed(512, &mut recorder);

        assert_eq!(
            recorder.0,
            [Stage::Smoothed(512), Stage::BandPassed(0)]
        );
    }

    #[test]
    fn disabled_stages_pass_samples_through() {
        let mut baseline: BaselineRemoval<0> = BaselineRemoval::new();
        let mut output: OutputSmoother<0> = OutputSmoother::new();

        for x in [5, -300, 2048] {
            assert_eq!(baseline.update(x), x);
            assert_eq!(output.update(x), x);
        }
    }

    #[test]
    fn baseline_removal_follows_slow_drift() {
        let mut baseline: BaselineRemoval<4> = BaselineRemoval::new();

        assert_eq!(baseline.update(1000), 0);
        assert_eq!(baseline.update(1400), 300);

        for _ in 0..4 {
            baseline.update(1400);
        }
        assert_eq!(baseline.update(1400), 0);
    }

    #[test]
    fn output_smoother_averages_from_zero() {
        let mut output: OutputSmoother<5> = OutputSmoother::new();

        let outputs: Vec<i32> = [500, 0, 0, 0, 0, 0].iter().map(|&x| output.update(x)).collect();
        assert_eq!(outputs, [100, 100, 100, 100, 100, 0]);
    }

    #[test]
    fn board_pipeline_reports_every_stage() {
        struct Recorder(Vec<Stage>);
        impl Observer for Recorder {
            fn stage(&mut self, stage: Stage) {
                self.0.push(stage);
            }
        }

        let mut pipeline = Pipeline64Hz::new();
        let mut recorder = Recorder(Vec::new());
        pipeline.condition_observed(2048, &mut recorder);

        assert_eq!(
            recorder.0,
            [
                Stage::Smoothed(2048),
                Stage::BaselineRemoved(0),
                Stage::BandPassed(0),
                Stage::OutputSmoothed(0),
            ]
        );

        // a constant offset never gets through
        for _ in 0..300 {
            assert_eq!(pipeline.condition(2048), 0);
        }
    }

    #[test]
    fn board_pipeline_keeps_a_narrow_complex() {
        let mut pipeline = Pipeline64Hz::new();
        for _ in 0..100 {
            pipeline.condition(2048);
        }

        let outputs: Vec<i32> = [2448, 3048, 2448, 2048, 2048, 2048, 2048]
            .iter()
            .map(|&raw| pipeline.condition(raw))
            .collect();
        let peak = outputs.iter().copied().max().unwrap();

        assert!(peak > 150, "{:?}", outputs);
    }
}
