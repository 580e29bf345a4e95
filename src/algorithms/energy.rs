//! Derivative, squaring and moving-window integration.

use crate::sliding::{Prefix, SlidingWindow, SummingWindow};

/// Longest supported moving average of the squared derivative.
pub const MAX_SQUARE_SMOOTHING: usize = 8;

/// Intermediate values computed for one band-passed sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnergySample {
    pub derivative: i32,
    pub squared: i32,
    /// `squared` after the optional moving average, the input of the integrator.
    pub smoothed: i32,
    pub integrated: i32,
}

pub struct Energy<IB> {
    taps: SlidingWindow<i32, [i32; 5]>,
    smoothing: SummingWindow<Prefix<MAX_SQUARE_SMOOTHING>>,
    integration: SummingWindow<IB>,
}

impl<IB> Energy<IB>
where
    IB: AsRef<[i32]> + AsMut<[i32]>,
{
    /// `square_smoothing` is the length of the moving average applied to the squared
    /// derivative before integration. `1` (or `0`) disables it, longer windows are capped at
    /// [`MAX_SQUARE_SMOOTHING`].
    pub fn new(integration_buffer: IB, square_smoothing: usize) -> Self {
        Self {
            taps: SlidingWindow::default(),
            smoothing: SummingWindow::new(Prefix::new(square_smoothing.max(1))),
            integration: SummingWindow::new(integration_buffer),
        }
    }

    pub fn clear(&mut self) {
        self.taps.clear();
        self.smoothing.clear();
        self.integration.clear();
    }

    /// Five-point derivative `(2x[n] + x[n-1] - x[n-3] - 2x[n-4]) / 8`.
    ///
    /// The weighted sum is formed first and scaled last. Samples before the first one count
    /// as zero.
    fn derivative(&mut self, sample: i32) -> i32 {
        self.taps.push(sample);
        let x = |age| i64::from(self.taps.recent(age).unwrap_or(0));

        let slope = 2 * x(0) + x(1) - x(3) - 2 * x(4);
        (slope / 8) as i32
    }

    pub fn update(&mut self, sample: i32) -> EnergySample {
        let derivative = self.derivative(sample);

        let squared = i64::from(derivative) * i64::from(derivative);
        let squared = squared.min(i64::from(i32::MAX)) as i32;

        self.smoothing.push(squared);
        let smoothed = self.smoothing.mean() as i32;

        self.integration.push(smoothed);
        let integrated = self.integration.mean() as i32;

        EnergySample {
            derivative,
            squared,
            smoothed,
            integrated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_response() {
        let mut energy = Energy::new([0; 30], 1);

        let derivatives: Vec<i32> = [1000, 0, 0, 0, 0, 0]
            .iter()
            .map(|&x| energy.update(x).derivative)
            .collect();
        assert_eq!(derivatives, [250, 125, 0, -125, -250, 0]);
    }

    #[test]
    fn integrates_squared_derivative() {
        let mut energy = Energy::new([0; 30], 1);

        let first = energy.update(1000);
        assert_eq!(first.squared, 62_500);
        assert_eq!(first.integrated, 62_500 / 30);

        let mut plateau = first;
        for _ in 0..10 {
            plateau = energy.update(0);
        }
        assert_eq!(plateau.integrated, 156_250 / 30);
    }

    #[test]
    fn linear_ramp_has_constant_slope() {
        let mut energy = Energy::new([0; 10], 1);
        let mut last = EnergySample::default();
        for n in 0..20 {
            last = energy.update(40 * n);
        }

        assert_eq!(last.derivative, 50);
        assert_eq!(last.integrated, 2500);
    }

    #[test]
    fn smoothing_spreads_the_squared_derivative() {
        let mut energy = Energy::new([0; 30], 4);

        let smoothed: Vec<i32> = [1000, 0, 0, 0, 0, 0]
            .iter()
            .map(|&x| energy.update(x).smoothed)
            .collect();
        // squares are 62_500, 15_625, 0, 15_625, 62_500, 0
        assert_eq!(smoothed, [15_625, 19_531, 19_531, 23_437, 23_437, 19_531]);

        // the integrator still sees the same energy once everything has passed through
        let mut last = EnergySample::default();
        for _ in 0..4 {
            last = energy.update(0);
        }
        assert_eq!(last.smoothed, 0);
        assert_eq!(last.integrated, 156_250 / 30);
    }
}
