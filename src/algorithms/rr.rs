use crate::sliding::SlidingWindow;

/// Number of RR intervals kept for the averages.
pub const RR_HISTORY: usize = 8;

/// The last [`RR_HISTORY`] beat-to-beat intervals, in samples.
pub struct RrHistory {
    intervals: SlidingWindow<u32, [u32; RR_HISTORY]>,
    /// Acceptance band for RR-AVG2, as fractions of RR-AVG1
    low: f32,
    high: f32,
    average1: Option<u32>,
    average2: Option<u32>,
}

impl RrHistory {
    pub fn new(low: f32, high: f32) -> Self {
        Self {
            intervals: SlidingWindow::default(),
            low,
            high,
            average1: None,
            average2: None,
        }
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
        self.average1 = None;
        self.average2 = None;
    }

    /// Mean of all recorded intervals.
    pub fn average1(&self) -> Option<u32> {
        self.average1
    }

    /// Mean of the recorded intervals within the acceptance band around RR-AVG1, or RR-AVG1
    /// itself when none of them is.
    pub fn average2(&self) -> Option<u32> {
        self.average2
    }

    pub fn record(&mut self, rr: u32) {
        self.intervals.push(rr);

        let count = self.intervals.len() as u64;
        let sum: u64 = self.intervals.iter_unordered().map(u64::from).sum();
        let average1 = (sum / count) as u32;

        let low = (self.low * average1 as f32) as u32;
        let high = (self.high * average1 as f32) as u32;
        let (sum2, count2) = self
            .intervals
            .iter_unordered()
            .filter(|rr| (low..=high).contains(rr))
            .fold((0u64, 0u64), |(sum, count), rr| (sum + u64::from(rr), count + 1));

        self.average1 = Some(average1);
        self.average2 = Some(match count2 {
            0 => average1,
            n => (sum2 / n) as u32,
        });
    }
}
