use log::{debug, warn};
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// Which movement of the monitored score counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopDirection {
    /// Improvement is a strict decrease by more than `min_delta`.
    #[default]
    Minimize,
    /// The stagnation counter grows whenever the score falls below the best
    /// so far and resets on any other score, which then becomes the best.
    Legacy,
}

/// Stops a run after `patience` consecutive epochs without improvement of the
/// validation loss.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    direction: StopDirection,
    best_score: Option<f64>,
    counter: usize,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, direction: StopDirection, min_delta: f64) -> Result<Self> {
        if patience == 0 {
            return Err(Error::Config("early-stopping patience must be at least 1".into()));
        }
        if min_delta.is_nan() || min_delta < 0.0 {
            return Err(Error::Config(format!("min_delta must be non-negative, got {}", min_delta)));
        }
        Ok(Self {
            patience,
            min_delta,
            direction,
            best_score: None,
            counter: 0,
            stopped: false,
        })
    }

    /// Feeds the latest validation loss and returns whether training should
    /// stop. The first score only sets the baseline.
    pub fn observe(&mut self, score: f64) -> bool {
        if self.stopped {
            return true;
        }
        let Some(best) = self.best_score else {
            self.best_score = Some(score);
            return false;
        };

        let improved = match self.direction {
            StopDirection::Minimize => score < best - self.min_delta,
            StopDirection::Legacy => score >= best + self.min_delta,
        };
        if improved {
            self.best_score = Some(score);
            self.counter = 0;
        } else {
            self.counter += 1;
            debug!("early-stopping counter: {} out of {}", self.counter, self.patience);
            if self.counter >= self.patience {
                self.stopped = true;
                warn!("no improvement for {} epochs, stopping early", self.patience);
            }
        }
        self.stopped
    }

    pub fn should_stop(&self) -> bool {
        self.stopped
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn reset(&mut self) {
        self.best_score = None;
        self.counter = 0;
        self.stopped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_loss_stops_after_patience_further_epochs() {
        let mut es = EarlyStopping::new(3, StopDirection::Minimize, 0.0).unwrap();
        let stops: Vec<bool> = (0..4).map(|_| es.observe(1.0)).collect();
        assert_eq!(stops, vec![false, false, false, true]);
    }

    #[test]
    fn decreasing_loss_never_stops() {
        let mut es = EarlyStopping::new(1, StopDirection::Minimize, 0.0).unwrap();
        for loss in [5.0, 4.0, 3.0, 2.0] {
            assert!(!es.observe(loss));
        }
        assert_eq!(es.best_score(), Some(2.0));
    }

    #[test]
    fn improvement_resets_the_counter() {
        let mut es = EarlyStopping::new(2, StopDirection::Minimize, 0.0).unwrap();
        es.observe(1.0);
        es.observe(1.5);
        assert_eq!(es.counter(), 1);
        es.observe(0.5);
        assert_eq!(es.counter(), 0);
        assert!(!es.observe(0.7));
        assert!(es.observe(0.9));
    }

    #[test]
    fn min_delta_ignores_small_decreases() {
        let mut es = EarlyStopping::new(1, StopDirection::Minimize, 0.1).unwrap();
        es.observe(1.0);
        assert!(es.observe(0.95));
    }

    #[test]
    fn legacy_direction_counts_decreases() {
        let mut es = EarlyStopping::new(2, StopDirection::Legacy, 0.0).unwrap();
        es.observe(3.0);
        assert!(!es.observe(2.0));
        assert!(es.observe(1.0));

        let mut es = EarlyStopping::new(1, StopDirection::Legacy, 0.0).unwrap();
        for loss in [1.0, 1.0, 2.0, 3.0] {
            assert!(!es.observe(loss));
        }
    }

    #[test]
    fn zero_patience_is_rejected() {
        assert!(matches!(EarlyStopping::new(0, StopDirection::Minimize, 0.0), Err(Error::Config(_))));
    }

    #[test]
    fn reset_clears_state() {
        let mut es = EarlyStopping::new(1, StopDirection::Minimize, 0.0).unwrap();
        es.observe(1.0);
        es.observe(1.0);
        assert!(es.should_stop());
        es.reset();
        assert!(!es.should_stop());
        assert_eq!(es.best_score(), None);
    }
}
