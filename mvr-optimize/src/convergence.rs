#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The smallest slope of the error history that still counts as progress.
const PLATEAU_SLOPE: f64 = 1e-4;

/// The mean, minimum and maximum error over the tiles of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ErrorStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// When the single round optimizer stops iterating and whether its result is acceptable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(default))]
pub struct ConvergenceStrategy {
    /// The largest acceptable mean tile error.
    pub max_allowed_error: f64,
    pub max_iterations: usize,
    /// The number of iterations over which the error must stop improving.
    pub max_plateau_width: usize,
}

impl Default for ConvergenceStrategy {
    fn default() -> Self {
        Self {
            max_allowed_error: 5.0,
            max_iterations: 10_000,
            max_plateau_width: 200,
        }
    }
}

impl ConvergenceStrategy {
    pub fn new(max_allowed_error: f64, max_iterations: usize, max_plateau_width: usize) -> Self {
        Self {
            max_allowed_error,
            max_iterations,
            max_plateau_width,
        }
    }

    /// Accepts any error and only stops once the error stops improving.
    pub fn unconstrained() -> Self {
        Self {
            max_allowed_error: f64::INFINITY,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_allowed_error(self, max_allowed_error: f64) -> Self {
        Self {
            max_allowed_error,
            ..self
        }
    }

    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    #[must_use]
    pub fn max_plateau_width(self, max_plateau_width: usize) -> Self {
        Self {
            max_plateau_width,
            ..self
        }
    }

    pub fn is_converged(&self, error: &ErrorStatistics) -> bool {
        error.mean <= self.max_allowed_error
    }

    /// Decides whether another iteration should run, given the mean error after every iteration so far.
    ///
    /// Iteration continues while the error is above `max_allowed_error` or still changing over
    /// any of the windows `w, w/2, ..., 1` of the plateau width `w`. The plateau is only checked
    /// once more than `w` iterations have run.
    pub fn should_continue(&self, history: &[f64]) -> bool {
        let iterations = history.len();
        if iterations >= self.max_iterations {
            return false;
        }
        let width = self.max_plateau_width;
        if iterations <= width {
            return true;
        }
        let last = history[iterations - 1];
        if last > self.max_allowed_error {
            return true;
        }
        let mut d = width;
        while d >= 1 {
            let slope = (last - history[iterations - 1 - d]) / d as f64;
            if slope.abs() > PLATEAU_SLOPE {
                return true;
            }
            d /= 2;
        }
        false
    }
}

/// Decides after a whole optimization whether a link has to be removed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(default))]
pub struct IterativeConvergenceStrategy {
    /// The strategy of each optimization round.
    pub convergence: ConvergenceStrategy,
    /// The largest acceptable ratio of the maximum tile error to the mean tile error.
    pub relative_threshold: f64,
    /// The largest acceptable tile error.
    pub absolute_threshold: f64,
}

impl Default for IterativeConvergenceStrategy {
    fn default() -> Self {
        Self {
            convergence: ConvergenceStrategy::default(),
            relative_threshold: 3.5,
            absolute_threshold: 7.0,
        }
    }
}

impl IterativeConvergenceStrategy {
    pub fn new(convergence: ConvergenceStrategy, relative_threshold: f64, absolute_threshold: f64) -> Self {
        Self {
            convergence,
            relative_threshold,
            absolute_threshold,
        }
    }

    /// A single tile far above the mean or a mean above the absolute threshold means not converged.
    pub fn is_converged(&self, error: &ErrorStatistics) -> bool {
        let outlier = error.mean * self.relative_threshold < error.max && error.max > self.absolute_threshold;
        !(outlier || error.mean > self.absolute_threshold)
    }
}
