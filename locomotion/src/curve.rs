//! Piecewise-linear keyframe curves used by configuration records
//! (mantle blend-in, interpolation-and-correction, rotation speed).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Vec3;

/// Values a curve can interpolate between keys.
pub trait CurveValue: Copy {
    fn zero() -> Self;
    fn lerp(&self, other: &Self, alpha: f32) -> Self;
    fn is_finite(&self) -> bool;
}

impl CurveValue for f32 {
    fn zero() -> Self {
        0.0
    }

    fn lerp(&self, other: &Self, alpha: f32) -> Self {
        self + (other - self) * alpha
    }

    fn is_finite(&self) -> bool {
        f32::is_finite(*self)
    }
}

impl CurveValue for Vec3 {
    fn zero() -> Self {
        Vec3::zeros()
    }

    fn lerp(&self, other: &Self, alpha: f32) -> Self {
        Vec3::lerp(self, other, alpha)
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

/// Keyframes as `(time, value)` pairs sorted by time.
///
/// Sampling clamps to the first/last key outside the key range. An empty curve samples to zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve<V> {
    pub keys: Vec<(f32, V)>,
}

pub type FloatCurve = Curve<f32>;
/// Three channels sampled together (e.g. interpolation, horizontal and vertical correction).
pub type VectorCurve = Curve<Vec3>;

impl<V: CurveValue> Curve<V> {
    pub fn new(keys: Vec<(f32, V)>) -> Self {
        Self { keys }
    }

    /// A single-key curve holding `value` everywhere.
    pub fn constant(value: V) -> Self {
        Self::new(vec![(0.0, value)])
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn sample(&self, time: f32) -> V {
        let Some(&(first_time, first_value)) = self.keys.first() else {
            return V::zero();
        };
        if time <= first_time {
            return first_value;
        }

        for pair in self.keys.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if time <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return v1;
                }
                return v0.lerp(&v1, (time - t0) / span);
            }
        }

        self.keys.last().map(|&(_, v)| v).unwrap_or(first_value)
    }

    /// `(min_time, max_time)` of the keys, `(0, 0)` when empty.
    pub fn time_range(&self) -> (f32, f32) {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => (0.0, 0.0),
        }
    }

    /// Keys must be finite and sorted by time. `what` names the curve in the error.
    pub fn validate(&self, what: &str, require_keys: bool) -> Result<(), ConfigError> {
        if require_keys && self.keys.is_empty() {
            return Err(ConfigError::EmptyCurve(what.to_string()));
        }
        for (time, value) in &self.keys {
            if !time.is_finite() || !value.is_finite() {
                return Err(ConfigError::NonFinite(what.to_string()));
            }
        }
        if self.keys.windows(2).any(|pair| pair[1].0 < pair[0].0) {
            return Err(ConfigError::UnsortedCurve(what.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_between_and_outside_keys() {
        let curve = FloatCurve::new(vec![(0.0, 0.0), (1.0, 10.0), (2.0, 0.0)]);
        assert_eq!(curve.sample(-1.0), 0.0);
        assert_eq!(curve.sample(0.5), 5.0);
        assert_eq!(curve.sample(1.5), 5.0);
        assert_eq!(curve.sample(3.0), 0.0);
        assert_eq!(curve.time_range(), (0.0, 2.0));
    }

    #[test]
    fn empty_curve_samples_to_zero() {
        let curve = VectorCurve::default();
        assert_eq!(curve.sample(0.3), Vec3::zeros());
        assert_eq!(curve.time_range(), (0.0, 0.0));
        assert!(curve.validate("empty", true).is_err());
        assert!(curve.validate("empty", false).is_ok());
    }

    #[test]
    fn rejects_unsorted_keys() {
        let curve = FloatCurve::new(vec![(1.0, 0.0), (0.5, 1.0)]);
        assert!(matches!(
            curve.validate("blend_in", true),
            Err(ConfigError::UnsortedCurve(name)) if name == "blend_in"
        ));
    }

    #[test]
    fn vector_channels_interpolate_independently() {
        let curve = VectorCurve::new(vec![
            (0.0, Vec3::new(1.0, 0.0, 0.0)),
            (1.0, Vec3::new(0.0, 1.0, 0.5)),
        ]);
        let mid = curve.sample(0.5);
        assert!((mid - Vec3::new(0.5, 0.5, 0.25)).norm() < 1.0e-6);
    }
}
