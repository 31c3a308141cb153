use super::checkpoint::UnitKey;
use thiserror::Error;

/// Relative tolerance used to decide whether `max - min` is a whole number of steps.
const ENDPOINT_TOLERANCE: f64 = 1e-9;
/// Grid values are rounded to this many decimal places to shed accumulation noise.
const SNAP_SCALE: f64 = 1e12;
/// Snapping may move a value by at most this fraction of a step.
const SNAP_STEP_FRACTION: f64 = 1e-3;
const MAX_GRID_POINTS: usize = 1_000_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Grid bounds must be finite (min = {min}, max = {max}, step = {step})")]
    NonFinite { min: f64, max: f64, step: f64 },

    #[error("Grid step must be positive, got {0}")]
    NonPositiveStep(f64),

    #[error("Grid minimum {min} exceeds maximum {max}")]
    InvertedBounds { min: f64, max: f64 },

    #[error("Grid would contain {points} points; at most {MAX_GRID_POINTS} are supported")]
    TooLarge { points: f64 },

    #[error("Grid values {first} and {second} share the solution key '{key}'; use a coarser step")]
    KeyCollision { key: String, first: f64, second: f64 },
}

/// Bounds of a one-dimensional parameter grid, `max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl GridSpec {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Checks the bounds and that every grid value gets its own solution key.
    pub fn validate(&self) -> Result<(), GridError> {
        self.generate().map(|_| ())
    }

    fn check_bounds(&self) -> Result<(), GridError> {
        let Self { min, max, step } = *self;
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(GridError::NonFinite { min, max, step });
        }
        if step <= 0.0 {
            return Err(GridError::NonPositiveStep(step));
        }
        if min > max {
            return Err(GridError::InvertedBounds { min, max });
        }
        let points = ((max - min) / step).floor() + 1.0;
        if points > MAX_GRID_POINTS as f64 {
            return Err(GridError::TooLarge { points });
        }
        Ok(())
    }

    pub fn generate(&self) -> Result<Vec<f64>, GridError> {
        generate(self.min, self.max, self.step)
    }
}

/// Enumerates `min, min + step, ...` up to and including `max`.
///
/// Each value is computed as `min + i * step` rather than by accumulation. When
/// `max - min` is a whole number of steps (within a relative tolerance) the final
/// value is exactly `max`; otherwise the grid stops at the last value below `max`.
/// The result is a pure function of its inputs, so a restarted sweep regenerates
/// the same grid and therefore the same checkpoint keys.
///
/// # Errors
///
/// Returns a [`GridError`] if any bound is not finite, `step <= 0`, `min > max`,
/// the grid would be unreasonably large, or two values would share a solution key.
pub fn generate(min: f64, max: f64, step: f64) -> Result<Vec<f64>, GridError> {
    GridSpec::new(min, max, step).check_bounds()?;

    let span = (max - min) / step;
    let nearest = span.round();
    let ends_on_max = (span - nearest).abs() <= ENDPOINT_TOLERANCE * nearest.max(1.0);
    let intervals = if ends_on_max { nearest } else { span.floor() } as usize;

    let mut values: Vec<f64> = (0..=intervals)
        .map(|i| match i {
            0 => min,
            _ => snap(min + i as f64 * step, step).min(max),
        })
        .collect();
    if ends_on_max {
        if let Some(last) = values.last_mut() {
            *last = max;
        }
    }

    ensure_distinct_keys(&values)?;
    Ok(values)
}

/// Rounds away accumulation noise, unless that could move the value onto a neighbour
/// or the scaled value leaves the finite range.
fn snap(value: f64, step: f64) -> f64 {
    let snapped = (value * SNAP_SCALE).round() / SNAP_SCALE;
    if snapped.is_finite() && (snapped - value).abs() <= step * SNAP_STEP_FRACTION {
        snapped
    } else {
        value
    }
}

/// Values are non-decreasing, so any shared key shows up between neighbours.
fn ensure_distinct_keys(values: &[f64]) -> Result<(), GridError> {
    for pair in values.windows(2) {
        let (first, second) = (UnitKey::for_value(pair[0]), UnitKey::for_value(pair[1]));
        if first == second {
            return Err(GridError::KeyCollision {
                key: first.to_string(),
                first: pair[0],
                second: pair[1],
            });
        }
    }
    Ok(())
}
