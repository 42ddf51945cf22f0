// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Exponentially weighted smoothing of a delay trend.
//!
//! The estimator is fed a delay value together with the time elapsed since
//! the previous value. The instantaneous gradient is the change of the value
//! per millisecond:
//!
//! ```text
//! diff = (current - previous) / elapsed_ms
//! smoothed_diff = (1 - alpha) * smoothed_diff + alpha * diff
//! ```
//!
//! The first gradient seeds the smoothed value, so the smoothed gradient is
//! always a convex combination of the observed gradients.

/// Smoothed gradient of a delay signal.
#[derive(Debug, Clone)]
pub struct GradientEstimator {
    /// Smoothing factor, in (0, 1].
    alpha: f64,

    /// The last recorded value.
    previous_value: Option<f64>,

    /// The smoothed gradient, None before the first gradient sample.
    smoothed_diff: Option<f64>,
}

impl GradientEstimator {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            previous_value: None,
            smoothed_diff: None,
        }
    }

    /// Record a delay value observed `elapsed_ms` after the previous one and
    /// return the smoothed gradient.
    ///
    /// A zero elapsed time leaves the estimator untouched.
    pub fn record_sample(&mut self, current_value: f64, elapsed_ms: u64) -> f64 {
        if elapsed_ms == 0 || !current_value.is_finite() {
            return self.smoothed();
        }

        let previous = match self.previous_value.replace(current_value) {
            Some(v) => v,
            None => return self.smoothed(),
        };

        let diff = (current_value - previous) / elapsed_ms as f64;
        let smoothed = match self.smoothed_diff {
            Some(s) => (1.0 - self.alpha) * s + self.alpha * diff,
            None => diff,
        };
        self.smoothed_diff = Some(smoothed);

        smoothed
    }

    /// Return the smoothed gradient, zero before any gradient sample.
    pub fn smoothed(&self) -> f64 {
        self.smoothed_diff.unwrap_or(0.0)
    }

    /// Return the last recorded value.
    pub fn previous_value(&self) -> Option<f64> {
        self.previous_value
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.previous_value = None;
        self.smoothed_diff = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn gradient_first_samples() {
        let mut g = GradientEstimator::new(0.5);
        assert_eq!(g.smoothed(), 0.0);

        // The first value only sets the baseline.
        assert_eq!(g.record_sample(10.0, 5), 0.0);
        assert_eq!(g.previous_value(), Some(10.0));

        // The first gradient seeds the smoothed value.
        assert_eq!(g.record_sample(20.0, 5), 2.0);

        // Later gradients are smoothed.
        assert_eq!(g.record_sample(20.0, 5), 1.0);
        assert_eq!(g.record_sample(10.0, 10), 0.0);
    }

    #[test]
    fn gradient_zero_elapsed_is_noop() {
        let mut g = GradientEstimator::new(0.15);
        g.record_sample(0.0, 10);
        g.record_sample(4.0, 10);
        let smoothed = g.smoothed();
        let previous = g.previous_value();

        for _ in 0..10 {
            assert_eq!(g.record_sample(1000.0, 0), smoothed);
            assert_eq!(g.smoothed(), smoothed);
            assert_eq!(g.previous_value(), previous);
        }
    }

    #[test]
    fn gradient_ignores_non_finite() {
        let mut g = GradientEstimator::new(0.15);
        g.record_sample(0.0, 10);
        g.record_sample(f64::NAN, 10);
        g.record_sample(f64::INFINITY, 10);
        assert_eq!(g.previous_value(), Some(0.0));
        assert_eq!(g.smoothed(), 0.0);
    }

    #[test]
    fn gradient_reset() {
        let mut g = GradientEstimator::new(0.15);
        g.record_sample(0.0, 10);
        g.record_sample(10.0, 10);
        g.reset();
        assert_eq!(g.previous_value(), None);
        assert_eq!(g.smoothed(), 0.0);
    }

    #[test]
    fn gradient_constant_delay() {
        let mut g = GradientEstimator::new(0.15);
        for i in 0..50 {
            g.record_sample(37.0, 10 + i % 3);
        }
        assert_eq!(g.smoothed(), 0.0);
    }

    #[test]
    fn gradient_within_convex_bound() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let alpha = rng.gen_range(0.01..=1.0);
            let mut g = GradientEstimator::new(alpha);
            let mut value = rng.gen_range(-100.0..100.0);
            g.record_sample(value, 1);

            let mut min_diff = f64::MAX;
            let mut max_diff = f64::MIN;
            for _ in 0..200 {
                let elapsed = rng.gen_range(1..50_u64);
                let next = value + rng.gen_range(-20.0..20.0);
                let diff = (next - value) / elapsed as f64;
                min_diff = min_diff.min(diff);
                max_diff = max_diff.max(diff);
                value = next;

                let smoothed = g.record_sample(value, elapsed);
                assert!(smoothed >= min_diff - 1e-9, "{} < {}", smoothed, min_diff);
                assert!(smoothed <= max_diff + 1e-9, "{} > {}", smoothed, max_diff);
            }
        }
    }
}
