//! Tunable scheduler parameters.

use chrono::Duration;

use crate::ParameterError;
use crate::algorithm::{DEFAULT_WEIGHTS, WEIGHT_COUNT};

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FsrsParameters {
    pub weights: [f64; WEIGHT_COUNT],
    /// Target probability of recall when a card comes due
    pub desired_retention: f64,
    /// Same-day steps for a new card before it graduates to Review
    pub learning_steps: Vec<Duration>,
    /// Same-day steps after a lapse
    pub relearning_steps: Vec<Duration>,
    pub maximum_interval_days: i64,
}

impl Default for FsrsParameters {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            desired_retention: 0.9,
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
            maximum_interval_days: 36500,
        }
    }
}

impl FsrsParameters {
    /// Replace the weights from a slice, checking its length.
    pub fn with_weights(mut self, weights: &[f64]) -> Result<Self, ParameterError> {
        self.weights = weights
            .try_into()
            .map_err(|_| ParameterError::WeightCount {
                expected: WEIGHT_COUNT,
                actual: weights.len(),
            })?;
        Ok(self)
    }

    pub fn with_learning_steps(mut self, steps: Vec<Duration>) -> Self {
        self.learning_steps = steps;
        self
    }

    pub fn with_relearning_steps(mut self, steps: Vec<Duration>) -> Self {
        self.relearning_steps = steps;
        self
    }

    pub fn with_desired_retention(mut self, retention: f64) -> Self {
        self.desired_retention = retention;
        self
    }

    pub fn with_maximum_interval_days(mut self, days: i64) -> Self {
        self.maximum_interval_days = days;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(self.desired_retention > 0.0 && self.desired_retention < 1.0) {
            return Err(ParameterError::Retention(self.desired_retention));
        }
        if self.maximum_interval_days < 1 {
            return Err(ParameterError::MaximumInterval(self.maximum_interval_days));
        }
        if let Some((i, w)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite())
        {
            return Err(ParameterError::Weight {
                index: i,
                value: *w,
            });
        }
        if self.weights[..4].iter().any(|w| *w <= 0.0) {
            return Err(ParameterError::Weight {
                index: 0,
                value: self.weights[..4]
                    .iter()
                    .copied()
                    .fold(f64::INFINITY, f64::min),
            });
        }
        let mut steps = self.learning_steps.iter().chain(&self.relearning_steps);
        if steps.any(|s| *s <= Duration::zero()) {
            return Err(ParameterError::Step);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = FsrsParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.learning_steps.len(), 2);
        assert_eq!(params.relearning_steps, vec![Duration::minutes(10)]);
    }

    #[test]
    fn retention_out_of_range_rejected() {
        let params = FsrsParameters::default().with_desired_retention(1.0);
        assert!(matches!(
            params.validate(),
            Err(ParameterError::Retention(_))
        ));
    }

    #[test]
    fn wrong_weight_count_rejected() {
        let err = FsrsParameters::default()
            .with_weights(&[1.0, 2.0])
            .unwrap_err();
        assert!(err.to_string().contains("19"));
    }

    #[test]
    fn zero_step_rejected() {
        let params = FsrsParameters::default().with_learning_steps(vec![Duration::zero()]);
        assert!(matches!(params.validate(), Err(ParameterError::Step)));
    }

    #[test]
    fn empty_steps_are_allowed() {
        let params = FsrsParameters::default()
            .with_learning_steps(vec![])
            .with_relearning_steps(vec![]);
        assert!(params.validate().is_ok());
    }
}
