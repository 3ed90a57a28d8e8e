//! Transform from errors to priorities with running bounds.
use super::PerConfig;

/// Computes `p = (|error| + eps)^alpha` and tracks the extrema of every priority it
/// has produced.
///
/// The bounds only widen: they are not revised when the transition that set them is
/// overwritten or later gets a lower priority. The maximum seeds new transitions and
/// the minimum normalizes importance sampling weights, for which a stale minimum is a
/// conservative bound.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityTransform {
    eps: f32,
    alpha: f32,
    max: f32,
    min: f32,
}

impl PriorityTransform {
    /// Creates a transform with no priority observed yet.
    pub fn new(config: &PerConfig) -> Self {
        Self {
            eps: config.eps,
            alpha: config.alpha,
            max: f32::NEG_INFINITY,
            min: f32::INFINITY,
        }
    }

    /// Returns the priority for `error` and widens the bounds to include it.
    pub fn priority_for(&mut self, error: f32) -> f32 {
        let p = (error.abs() + self.eps).powf(self.alpha);
        if p > self.max {
            self.max = p;
        }
        if p < self.min {
            self.min = p;
        }
        p
    }

    /// Largest priority produced so far.
    pub fn max(&self) -> Option<f32> {
        if self.max.is_finite() {
            Some(self.max)
        } else {
            None
        }
    }

    /// Smallest priority produced so far.
    pub fn min(&self) -> Option<f32> {
        if self.min.is_finite() {
            Some(self.min)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn force_min(&mut self, min: f32) {
        self.min = min;
    }
}
