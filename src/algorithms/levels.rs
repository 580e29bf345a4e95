use crate::Thresholds;

#[derive(Copy, Clone, Debug)]
enum LevelState {
    /// samples remaining, largest integrated value, sum of integrated values
    Learning(u32, i32, i64),
    /// SPKI, NPKI
    Tracking(f32, f32),
}

/// Signal and noise level estimates (SPKI/NPKI) and the thresholds derived from them.
pub struct Levels {
    state: LevelState,
    learning_samples: u32,
    signal_factor: f32,
    noise_factor: f32,
}

impl Levels {
    pub fn new(learning_samples: u32, signal_factor: f32, noise_factor: f32) -> Self {
        let mut levels = Self {
            state: LevelState::Tracking(0.0, 0.0),
            learning_samples,
            signal_factor,
            noise_factor,
        };
        levels.clear();
        levels
    }

    pub fn clear(&mut self) {
        self.state = match self.learning_samples {
            0 => LevelState::Tracking(0.0, 0.0),
            n => LevelState::Learning(n, 0, 0),
        };
    }

    pub fn is_learning(&self) -> bool {
        matches!(self.state, LevelState::Learning(..))
    }

    /// Feeds one integrated sample to the learning phase. Returns the initial thresholds when
    /// this sample completes it.
    pub fn learn(&mut self, integrated: i32) -> Option<Thresholds> {
        let LevelState::Learning(remaining, max, sum) = self.state else {
            return None;
        };

        let max = max.max(integrated);
        let sum = sum + i64::from(integrated);

        if remaining > 1 {
            self.state = LevelState::Learning(remaining - 1, max, sum);
            return None;
        }

        // Halve the largest value seen so a single artifact cannot inflate the signal level
        let spki = max as f32 / 2.0;
        let npki = sum as f32 / self.learning_samples as f32;
        self.state = LevelState::Tracking(spki, npki);

        self.thresholds()
    }

    /// Moves SPKI an eighth of the way towards `value`.
    pub fn update_signal(&mut self, value: i32) {
        if let LevelState::Tracking(spki, npki) = self.state {
            self.state = LevelState::Tracking(0.125 * value as f32 + 0.875 * spki, npki);
        }
    }

    pub fn update_noise(&mut self, value: i32) {
        if let LevelState::Tracking(spki, npki) = self.state {
            self.state = LevelState::Tracking(spki, 0.125 * value as f32 + 0.875 * npki);
        }
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        match self.state {
            LevelState::Learning(..) => None,
            LevelState::Tracking(spki, npki) => {
                let i1 = npki + self.signal_factor * (spki - npki);
                Some(Thresholds {
                    signal_level: spki,
                    noise_level: npki,
                    i1,
                    i2: self.noise_factor * i1,
                })
            }
        }
    }
}
